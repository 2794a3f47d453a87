//! Exhaustive depth-first exploration of the reachable world graph.

use crate::invariant::{first_violated, Invariant};
use crate::step::{step_global, StepError};
use crate::store::WorldStore;
use crate::world::{World, WorldId};
use actorcheck_model::{Environment, MachineId, StateMachine};
use memory_stats::memory_stats;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, trace};

/// Expansions between time and memory samples.
const SAMPLE_INTERVAL: usize = 1000;

/// Returns current process memory usage in MB, or None if unavailable.
fn current_memory_mb() -> Option<usize> {
    memory_stats().map(|stats| stats.physical_mem / (1024 * 1024))
}

/// Invalid model configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("no state machines provided")]
    NoMachines,

    #[error("duplicate state machine id '{id}'")]
    DuplicateMachine { id: MachineId },
}

/// Exploration failure.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Step(#[from] StepError),
}

pub type CheckResult<T> = Result<T, CheckError>;

/// Exploration bounds. Every limit defaults to 0, meaning unlimited.
#[derive(Debug, Clone, Default)]
pub struct CheckConfig {
    /// Maximum number of distinct worlds to discover.
    pub max_worlds: usize,
    /// Maximum wall-clock time in seconds.
    pub max_time_secs: u64,
    /// Maximum process memory in MB, sampled every 1000 expanded worlds.
    pub memory_limit_mb: usize,
}

/// Counts describing an explored graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolveStats {
    pub worlds: usize,
    pub edges: usize,
    pub violations: usize,
    /// Explored worlds without successors.
    pub terminal: usize,
}

/// How exploration ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    /// Every reachable world was explored.
    Complete { stats: SolveStats },
    /// Stopped after discovering `max_worlds` worlds.
    WorldLimitReached { stats: SolveStats },
    /// Stopped at the time limit.
    TimeLimitReached { stats: SolveStats },
    /// Stopped at the memory limit.
    MemoryLimitReached { stats: SolveStats, memory_mb: usize },
}

impl SolveOutcome {
    pub fn stats(&self) -> &SolveStats {
        match self {
            SolveOutcome::Complete { stats }
            | SolveOutcome::WorldLimitReached { stats }
            | SolveOutcome::TimeLimitReached { stats }
            | SolveOutcome::MemoryLimitReached { stats, .. } => stats,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, SolveOutcome::Complete { .. })
    }
}

enum Stop {
    Worlds,
    Time,
    Memory(usize),
}

/// Kripke structure over the worlds of a model.
///
/// Built from the initial machines and invariants, filled in by [`solve`],
/// then read by the counterexample finder and the reporters.
///
/// [`solve`]: Kripke::solve
pub struct Kripke {
    initial: World,
    store: WorldStore,
    invariants: Vec<Box<dyn Invariant>>,
    solved: bool,
}

impl Kripke {
    /// Build the structure for the given machines. Each machine starts with a
    /// queue holding the startup event.
    pub fn new(
        machines: impl IntoIterator<Item = StateMachine>,
        invariants: Vec<Box<dyn Invariant>>,
    ) -> Result<Self, ModelError> {
        let mut env = Environment::new();
        for machine in machines {
            let id = machine.id().clone();
            if !env.spawn(machine) {
                return Err(ModelError::DuplicateMachine { id });
            }
        }
        if env.is_empty() {
            return Err(ModelError::NoMachines);
        }

        Ok(Self {
            initial: World::new(env),
            store: WorldStore::new(),
            invariants,
            solved: false,
        })
    }

    /// Explore every reachable world without bounds.
    pub fn solve(&mut self) -> CheckResult<SolveOutcome> {
        self.solve_with(&CheckConfig::default())
    }

    /// Explore reachable worlds depth-first, stopping early only at the
    /// configured bounds.
    ///
    /// Any handler failure aborts the run; the partially built structure must
    /// not be used afterwards.
    pub fn solve_with(&mut self, config: &CheckConfig) -> CheckResult<SolveOutcome> {
        info!(
            machines = self.initial.env().len(),
            invariants = self.invariants.len(),
            "starting exploration"
        );
        let start = Instant::now();
        let deadline = (config.max_time_secs > 0)
            .then(|| start + Duration::from_secs(config.max_time_secs));

        self.solved = false;
        self.store.clear();
        self.store.insert(&self.initial);
        let mut stack = vec![self.initial.clone()];
        let mut stop = None;
        let mut expanded = 0usize;

        while let Some(current) = stack.pop() {
            trace!(fp = %current.id(), pending = stack.len(), "exploring world");
            let sample = expanded % SAMPLE_INTERVAL == 0;
            expanded += 1;

            if config.max_worlds > 0 && self.store.len() >= config.max_worlds {
                info!(worlds = self.store.len(), "reached world limit");
                stop = Some(Stop::Worlds);
                break;
            }
            if sample {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    info!("reached time limit");
                    stop = Some(Stop::Time);
                    break;
                }
                if config.memory_limit_mb > 0 {
                    if let Some(mem_mb) = current_memory_mb() {
                        if mem_mb >= config.memory_limit_mb {
                            info!(
                                memory_mb = mem_mb,
                                limit_mb = config.memory_limit_mb,
                                "reached memory limit"
                            );
                            stop = Some(Stop::Memory(mem_mb));
                            break;
                        }
                    }
                }
            }

            if let Some(name) = first_violated(&self.invariants, &current) {
                debug!(fp = %current.id(), invariant = name, "invariant violated");
                self.store.mark_violation(&current.id());
            }

            let successors = step_global(&current)?;
            let mut edges = Vec::with_capacity(successors.len());
            for next in successors {
                edges.push(next.id());
                if self.store.insert(&next) {
                    stack.push(next);
                }
            }
            self.store.set_successors(current.id(), edges);
        }

        let stats = self.stats();
        info!(
            worlds = stats.worlds,
            edges = stats.edges,
            violations = stats.violations,
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "exploration complete"
        );
        if self.store.collisions() > 0 {
            error!(
                collisions = self.store.collisions(),
                "hash collisions detected: results may be unsound"
            );
        }

        self.solved = true;
        Ok(match stop {
            None => SolveOutcome::Complete { stats },
            Some(Stop::Worlds) => SolveOutcome::WorldLimitReached { stats },
            Some(Stop::Time) => SolveOutcome::TimeLimitReached { stats },
            Some(Stop::Memory(memory_mb)) => SolveOutcome::MemoryLimitReached { stats, memory_mb },
        })
    }

    fn stats(&self) -> SolveStats {
        SolveStats {
            worlds: self.store.len(),
            edges: self.store.edge_count(),
            violations: self.store.violation_count(),
            terminal: self
                .store
                .edges()
                .filter(|(_, succ)| succ.is_empty())
                .count(),
        }
    }

    /// The initial world, carrying its violation flag once explored.
    pub fn initial(&self) -> &World {
        self.store.get(&self.initial.id()).unwrap_or(&self.initial)
    }

    /// Whether the last exploration finished without error.
    #[inline]
    pub fn is_solved(&self) -> bool {
        self.solved
    }

    /// Explored world by id.
    pub fn world(&self, id: &WorldId) -> Option<&World> {
        self.store.get(id)
    }

    /// Explored worlds in discovery order.
    pub fn worlds(&self) -> impl Iterator<Item = &World> {
        self.store.worlds()
    }

    pub fn successors(&self, id: &WorldId) -> &[WorldId] {
        self.store.successors(id)
    }

    pub fn store(&self) -> &WorldStore {
        &self.store
    }

    pub fn invariants(&self) -> &[Box<dyn Invariant>] {
        &self.invariants
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    #[inline]
    pub fn collisions(&self) -> usize {
        self.store.collisions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invariant::invariant;
    use actorcheck_model::{Event, HandlerError, HandlerResult, MachineSpec};
    use std::sync::Arc;

    fn state_of(world: &World, id: &str) -> String {
        world.env().machine(id).unwrap().state().name().to_string()
    }

    #[test]
    fn test_no_machines_is_config_error() {
        let result = Kripke::new(Vec::new(), Vec::new());
        assert_eq!(result.err(), Some(ModelError::NoMachines));
    }

    #[test]
    fn test_duplicate_machine_rejected() {
        let spec = MachineSpec::builder("M", "A").build();
        let result = Kripke::new(
            vec![
                StateMachine::new("m", spec.clone()),
                StateMachine::new("m", spec),
            ],
            Vec::new(),
        );
        assert_eq!(
            result.err(),
            Some(ModelError::DuplicateMachine {
                id: MachineId::from("m")
            })
        );
    }

    #[test]
    fn test_initial_world_has_entry_events() {
        let spec = MachineSpec::builder("M", "A").build();
        let kripke = Kripke::new(
            vec![
                StateMachine::new("x", spec.clone()),
                StateMachine::new("y", spec),
            ],
            Vec::new(),
        )
        .unwrap();
        let env = kripke.initial().env();
        for id in ["x", "y"] {
            let q = env.queue(id).unwrap();
            assert_eq!(q.len(), 1);
            assert!(q[0].is_entry());
        }
        assert!(!kripke.is_solved());
        assert!(kripke.is_empty());
    }

    #[test]
    fn test_single_violation() {
        let spec = MachineSpec::builder("M", "A")
            .on_effect("A", "Entry", |env, id, _| env.goto(id, "B"))
            .build();
        let mut kripke = Kripke::new(
            vec![StateMachine::new("m", spec)],
            vec![invariant("not B", |w: &World| {
                !w.env().machine("m").is_some_and(|m| m.state().is("B"))
            })],
        )
        .unwrap();

        let outcome = kripke.solve().unwrap();
        assert!(outcome.is_complete());
        assert_eq!(
            *outcome.stats(),
            SolveStats {
                worlds: 2,
                edges: 1,
                violations: 1,
                terminal: 1,
            }
        );

        let initial = kripke.initial().id();
        assert!(!kripke.world(&initial).unwrap().violates_invariant());
        let next = kripke.successors(&initial)[0];
        let violating = kripke.world(&next).unwrap();
        assert!(violating.violates_invariant());
        assert_eq!(state_of(violating, "m"), "B");
    }

    #[test]
    fn test_cycle_terminates_with_self_loop() {
        let spec = MachineSpec::builder("M", "Loop")
            .on_effect("Loop", "Entry", |env, id, ev| {
                env.send(id, ev.clone())?;
                env.goto(id, "Loop")
            })
            .build();
        let mut kripke = Kripke::new(vec![StateMachine::new("m", spec)], Vec::new()).unwrap();

        let outcome = kripke.solve().unwrap();
        assert_eq!(outcome.stats().worlds, 1);
        let initial = kripke.initial().id();
        assert_eq!(kripke.successors(&initial), &[initial]);
    }

    #[test]
    fn test_dedup_counts_distinct_configurations() {
        // Two independent machines each take one step: the diamond
        // (A,A) -> (B,A) | (A,B) -> (B,B) has four distinct worlds.
        let spec = MachineSpec::builder("M", "A")
            .on_effect("A", "Entry", |env, id, _| env.goto(id, "B"))
            .build();
        let mut kripke = Kripke::new(
            vec![
                StateMachine::new("x", spec.clone()),
                StateMachine::new("y", spec),
            ],
            Vec::new(),
        )
        .unwrap();

        let stats = *kripke.solve().unwrap().stats();
        assert_eq!(stats.worlds, 4);
        assert_eq!(stats.edges, 4);
        assert_eq!(stats.terminal, 1);
        let ends: Vec<&World> = kripke
            .worlds()
            .filter(|w| kripke.successors(&w.id()).is_empty())
            .collect();
        assert_eq!(ends.len(), 1);
        assert_eq!(state_of(ends[0], "x"), "B");
        assert_eq!(state_of(ends[0], "y"), "B");
    }

    #[test]
    fn test_handler_error_aborts_solve() {
        let spec = MachineSpec::builder("M", "A")
            .on_effect("A", "Entry", |env, id, _| {
                env.send(id, Event::new("Crash"))?;
                env.goto(id, "B")
            })
            .on_effect("B", "Crash", |_, _, _| Err(HandlerError::failed("crashed")))
            .build();
        let mut kripke = Kripke::new(vec![StateMachine::new("m", spec)], Vec::new()).unwrap();

        let err = kripke.solve().unwrap_err();
        assert!(matches!(
            err,
            CheckError::Step(StepError::Handler { ref event, .. }) if event == "Crash"
        ));
        assert!(err.to_string().contains("crashed"));
        assert!(!kripke.is_solved());
    }

    #[test]
    fn test_world_limit() {
        // Counter that grows forever.
        let spec = MachineSpec::builder("Counter", "Run")
            .on_effect("Run", "Entry", |env, id, ev| {
                let n: u64 = env.machine(id).and_then(|m| m.field_as("n")).unwrap_or(0);
                env.set_field(id, "n", n + 1)?;
                env.send(id, ev.clone())
            })
            .build();
        let mut kripke = Kripke::new(vec![StateMachine::new("c", spec)], Vec::new()).unwrap();

        let config = CheckConfig {
            max_worlds: 10,
            ..Default::default()
        };
        let outcome = kripke.solve_with(&config).unwrap();
        match outcome {
            SolveOutcome::WorldLimitReached { stats } => assert_eq!(stats.worlds, 10),
            other => panic!("expected world limit, got {:?}", other),
        }
    }

    /// Grows forever, adding two new worlds per expansion.
    fn forking_counter() -> Kripke {
        let spec = MachineSpec::builder("Fork", "Run")
            .on("Run", "Entry", |env: Environment, id: &MachineId, ev: &Event| -> HandlerResult {
                let n: u64 = env.machine(id).and_then(|m| m.field_as("n")).unwrap_or(0);
                let mut outcomes = Vec::new();
                for side in ["left", "right"] {
                    let mut next = env.clone();
                    next.set_field(id, "n", n + 1)?;
                    next.set_field(id, "side", side)?;
                    next.send(id, ev.clone())?;
                    outcomes.push(next.into());
                }
                Ok(outcomes)
            })
            .build();
        Kripke::new(vec![StateMachine::new("f", spec)], Vec::new()).unwrap()
    }

    #[test]
    fn test_time_limit_with_even_fan_out() {
        let mut kripke = forking_counter();
        let config = CheckConfig {
            max_worlds: 20_000_001,
            max_time_secs: 1,
            ..Default::default()
        };
        let started = Instant::now();
        let outcome = kripke.solve_with(&config).unwrap();
        assert!(
            matches!(outcome, SolveOutcome::TimeLimitReached { .. }),
            "expected time limit, got {:?}",
            outcome
        );
        assert!(started.elapsed() < Duration::from_secs(30));
        assert!(kripke.len() % 2 == 1);
    }

    #[test]
    fn test_memory_limit_with_even_fan_out() {
        let mut kripke = forking_counter();
        let config = CheckConfig {
            max_worlds: 50_001,
            memory_limit_mb: 1,
            ..Default::default()
        };
        let outcome = kripke.solve_with(&config).unwrap();
        if current_memory_mb().is_some() {
            match outcome {
                SolveOutcome::MemoryLimitReached { memory_mb, .. } => assert!(memory_mb >= 1),
                other => panic!("expected memory limit, got {:?}", other),
            }
        } else {
            assert!(matches!(outcome, SolveOutcome::WorldLimitReached { .. }));
        }
    }

    #[test]
    fn test_initial_world_reports_violation() {
        let spec = MachineSpec::builder("M", "A").build();
        let mut kripke = Kripke::new(
            vec![StateMachine::new("m", spec)],
            vec![invariant("never A", |w: &World| {
                !w.env().machine("m").is_some_and(|m| m.state().is("A"))
            })],
        )
        .unwrap();
        assert!(!kripke.initial().violates_invariant());

        kripke.solve().unwrap();
        assert!(kripke.initial().violates_invariant());
        assert_eq!(kripke.initial().id(), kripke.worlds().next().unwrap().id());
    }

    #[test]
    fn test_separator_text_does_not_merge_worlds() {
        // One outcome packs both fields into one value; only the other
        // sets `b`, and only that one violates.
        let spec = MachineSpec::builder("M", "A")
            .on("A", "Entry", |env: Environment, id: &MachineId, _: &Event| -> HandlerResult {
                let mut packed = env.clone();
                packed.set_field(id, "a", "1,b=2")?;
                let mut split = env;
                split.set_field(id, "a", 1)?;
                split.set_field(id, "b", 2)?;
                Ok(vec![packed.into(), split.into()])
            })
            .build();
        let mut kripke = Kripke::new(
            vec![StateMachine::new("m", spec)],
            vec![invariant("b unset", |w: &World| {
                w.env().machine("m").is_some_and(|m| m.field("b").is_none())
            })],
        )
        .unwrap();

        let stats = *kripke.solve().unwrap().stats();
        assert_eq!(stats.worlds, 3);
        assert_eq!(stats.violations, 1);
        assert_eq!(kripke.collisions(), 0);
        assert_eq!(kripke.find_paths_to_violations().len(), 1);
    }

    #[test]
    fn test_solve_is_repeatable() {
        let spec: Arc<MachineSpec> = MachineSpec::builder("M", "A")
            .on_effect("A", "Entry", |env, id, _| env.goto(id, "B"))
            .build();
        let mut kripke = Kripke::new(
            vec![
                StateMachine::new("x", spec.clone()),
                StateMachine::new("y", spec),
            ],
            Vec::new(),
        )
        .unwrap();

        let first = kripke.solve().unwrap();
        let order: Vec<WorldId> = kripke.worlds().map(World::id).collect();
        let second = kripke.solve().unwrap();
        let again: Vec<WorldId> = kripke.worlds().map(World::id).collect();
        assert_eq!(first, second);
        assert_eq!(order, again);
    }
}
