//! Graphviz export and counterexample trace logs.

use crate::counterexample::{CounterexampleMode, Path};
use crate::explorer::Kripke;
use crate::world::{display_name, World};
use std::io::{self, Write};

/// Escape a string for use inside a double-quoted DOT attribute.
fn escape_dot(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

impl Kripke {
    /// Write the explored graph in Graphviz DOT format.
    ///
    /// The initial world is drawn with a thick border, violating worlds in red.
    pub fn write_dot<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let initial = self.initial().id();
        writeln!(w, "digraph {{")?;
        for world in self.worlds() {
            let id = world.id().as_u64();
            writeln!(w, "  {} [ label=\"{}\" ];", id, escape_dot(&world.label()))?;
            if world.id() == initial {
                writeln!(w, "  {} [ penwidth=5 ];", id)?;
            }
            if world.violates_invariant() {
                writeln!(w, "  {} [ color=red, penwidth=3 ];", id)?;
            }
        }
        for (from, tos) in self.store().edges() {
            for to in tos {
                writeln!(w, "  {} -> {};", from.as_u64(), to.as_u64())?;
            }
        }
        writeln!(w, "}}")
    }

    /// Write one block per counterexample, or a single line when there are
    /// none. `description` names the violated invariant.
    pub fn write_log<W: Write>(&self, w: &mut W, description: &str) -> io::Result<()> {
        self.write_log_with(w, description, CounterexampleMode::default())
    }

    pub fn write_log_with<W: Write>(
        &self,
        w: &mut W,
        description: &str,
        mode: CounterexampleMode,
    ) -> io::Result<()> {
        let paths = self.counterexamples(mode);
        if paths.is_empty() {
            return writeln!(w, "No invariant violations found.");
        }

        for (i, path) in paths.iter().enumerate() {
            if i > 0 {
                writeln!(w)?;
            }
            self.write_path(w, description, path)?;
        }
        Ok(())
    }

    fn write_path<W: Write>(&self, w: &mut W, description: &str, path: &Path) -> io::Result<()> {
        writeln!(w, "InvariantError:  {}   \u{2718}", description)?;
        writeln!(w, "Path (length = {}):", path.len())?;

        for (step, id) in path.iter().enumerate() {
            let Some(world) = self.world(id) else {
                continue;
            };
            if step + 1 == path.len() && world.violates_invariant() {
                writeln!(w, "  [{}] <-- violation here", step)?;
            } else {
                writeln!(w, "  [{}]", step)?;
            }
            write_world(w, world)?;
        }
        Ok(())
    }
}

fn write_world<W: Write>(w: &mut W, world: &World) -> io::Result<()> {
    let env = world.env();
    writeln!(w, "  StateMachines:")?;
    for m in env.machines() {
        writeln!(
            w,
            "    Name: {}, Detail: {}, State: {}",
            display_name(m.name(), m.id()),
            m.details(),
            m.state()
        )?;
    }
    writeln!(w, "  QueuedEvents:")?;
    for (id, events) in env.queues() {
        let name = env
            .machine(id)
            .map(|m| display_name(m.name(), id))
            .unwrap_or_else(|| id.to_string());
        for event in events {
            writeln!(
                w,
                "    StateMachine: {}, Event: {}, Detail: {}",
                name,
                event.name(),
                event.detail()
            )?;
        }
    }
    Ok(())
}
