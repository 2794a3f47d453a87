//! Command-line interface for the actorcheck model checker.

mod models;

use actorcheck_mc::{CheckConfig, CounterexampleMode, Kripke, ModelError, SolveOutcome};
use clap::{Parser, Subcommand};
use miette::Diagnostic;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("ACTORCHECK_GIT_HASH"),
    " ",
    env!("ACTORCHECK_GIT_DATE"),
    ")"
);

/// CLI error rendered through miette.
#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("failed to write {path}: {message}")]
    IoError { path: String, message: String },

    #[error("unknown model '{name}'")]
    #[diagnostic(
        code(actorcheck::unknown_model),
        help("run `actorcheck list` to see the bundled models")
    )]
    UnknownModel { name: String },

    #[error("invalid model: {0}")]
    #[diagnostic(code(actorcheck::model_error))]
    Model(#[from] ModelError),

    #[error("check error: {0}")]
    #[diagnostic(code(actorcheck::check_error))]
    Check(#[from] actorcheck_mc::CheckError),
}

impl CliError {
    fn io(path: impl AsRef<Path>, e: io::Error) -> Self {
        CliError::IoError {
            path: path.as_ref().display().to_string(),
            message: e.to_string(),
        }
    }
}

type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "actorcheck", version, long_version = LONG_VERSION)]
#[command(about = "Explicit-state model checker for actor state machines", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the bundled models
    List,

    /// Explore every reachable world of a bundled model
    Check {
        /// Model name (see `actorcheck list`)
        #[arg(value_name = "MODEL")]
        model: String,

        /// Maximum number of worlds to explore (0 = unlimited)
        #[arg(long, default_value = "0")]
        max_worlds: usize,

        /// Maximum time in seconds (0 = unlimited)
        #[arg(long, default_value = "0")]
        max_time: u64,

        /// Maximum memory usage in MB (0 = unlimited)
        #[arg(long, default_value = "0")]
        memory_limit: usize,

        /// Report a shortest path to every violating world, not only the
        /// first ones reached
        #[arg(long)]
        all_shortest: bool,

        /// Write the explored graph in Graphviz DOT format
        #[arg(long, value_name = "FILE")]
        dot: Option<PathBuf>,

        /// Write the counterexample log to a file instead of stdout
        #[arg(long, value_name = "FILE")]
        log: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

/// Output options for a check run.
struct Outputs {
    mode: CounterexampleMode,
    dot: Option<PathBuf>,
    log: Option<PathBuf>,
}

fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .build(),
        )
    }))
    .ok();

    let cli = Cli::parse();

    let filter = if matches!(&cli.command, Commands::Check { verbose: true, .. }) {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(io::stderr)
        .init();

    let result = match cli.command {
        Commands::List => cmd_list(),
        Commands::Check {
            model,
            max_worlds,
            max_time,
            memory_limit,
            all_shortest,
            dot,
            log,
            verbose: _,
        } => {
            let config = CheckConfig {
                max_worlds,
                max_time_secs: max_time,
                memory_limit_mb: memory_limit,
            };
            let outputs = Outputs {
                mode: if all_shortest {
                    CounterexampleMode::AllShortest
                } else {
                    CounterexampleMode::FirstReached
                },
                dot,
                log,
            };
            cmd_check(&model, &config, &outputs)
        }
    };

    match result {
        Ok(code) => {
            if code != 0 {
                std::process::exit(code);
            }
        }
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            std::process::exit(1);
        }
    }
}

fn cmd_list() -> CliResult<i32> {
    println!("Bundled models:");
    for model in models::MODELS {
        println!("  {:<12} {}", model.name, model.summary);
    }
    Ok(0)
}

/// Solve a bundled model and report. Returns the process exit code:
/// 1 when a violation was found, 2 when a bound stopped exploration.
fn cmd_check(name: &str, config: &CheckConfig, outputs: &Outputs) -> CliResult<i32> {
    let demo = models::find(name).ok_or_else(|| CliError::UnknownModel {
        name: name.to_string(),
    })?;
    let model = demo.build();
    let description = model.description();
    let mut kripke = model.into_kripke()?;

    info!(model = demo.name, "checking model");
    let start = Instant::now();
    let outcome = kripke.solve_with(config)?;
    let elapsed = start.elapsed();

    if let Some(path) = &outputs.dot {
        write_to(path, |w| kripke.write_dot(w))?;
        info!(path = %path.display(), "wrote DOT graph");
    }

    let stats = outcome.stats();
    let code = if stats.violations > 0 {
        println!("Result: INVARIANT VIOLATION");
        println!("  Invariant: {}", description);
        1
    } else {
        match &outcome {
            SolveOutcome::Complete { .. } => {
                println!("Result: OK");
                0
            }
            SolveOutcome::WorldLimitReached { .. } => {
                println!("Result: WORLD LIMIT REACHED");
                2
            }
            SolveOutcome::TimeLimitReached { .. } => {
                println!("Result: TIME LIMIT REACHED");
                2
            }
            SolveOutcome::MemoryLimitReached { memory_mb, .. } => {
                println!("Result: MEMORY LIMIT REACHED");
                println!("  Memory usage: {} MB", memory_mb);
                2
            }
        }
    };
    println!("  Worlds explored: {}", stats.worlds);
    println!("  Transitions: {}", stats.edges);
    println!("  Violating worlds: {}", stats.violations);
    println!("  Terminal worlds: {}", stats.terminal);
    println!("  Time: {:.2}s", elapsed.as_secs_f64());
    if kripke.collisions() > 0 {
        println!("  WARNING: {} fingerprint collisions", kripke.collisions());
    }

    write_log(&kripke, &description, outputs)?;
    Ok(code)
}

fn write_log(kripke: &Kripke, description: &str, outputs: &Outputs) -> CliResult<()> {
    match &outputs.log {
        Some(path) => {
            write_to(path, |w| kripke.write_log_with(w, description, outputs.mode))?;
            info!(path = %path.display(), "wrote counterexample log");
            Ok(())
        }
        None => {
            println!();
            let mut stdout = io::stdout().lock();
            kripke
                .write_log_with(&mut stdout, description, outputs.mode)
                .and_then(|_| stdout.flush())
                .map_err(|e| CliError::io("<stdout>", e))
        }
    }
}

fn write_to(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>,
) -> CliResult<()> {
    let file = File::create(path).map_err(|e| CliError::io(path, e))?;
    let mut w = BufWriter::new(file);
    write(&mut w)
        .and_then(|_| w.flush())
        .map_err(|e| CliError::io(path, e))
}
