//! Explicit-state model checker for actorcheck models.
//!
//! [`Kripke::solve`] explores every world reachable from the initial
//! configuration, deduplicating by [`WorldId`] and flagging worlds where an
//! [`Invariant`] fails. Counterexamples are then read off the explored graph
//! breadth-first, and the graph and traces can be written as DOT or text.

pub mod counterexample;
pub mod explorer;
pub mod invariant;
pub mod report;
pub mod step;
pub mod store;
pub mod world;

pub use counterexample::{CounterexampleMode, Path};
pub use explorer::{
    CheckConfig, CheckError, CheckResult, Kripke, ModelError, SolveOutcome, SolveStats,
};
pub use invariant::{invariant, FnInvariant, Invariant};
pub use step::{step_global, step_local, StepError};
pub use store::WorldStore;
pub use world::{canonical_key, World, WorldId};
