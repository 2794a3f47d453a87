//! Safety invariants evaluated on every reachable world.

use crate::world::World;
use std::fmt;

/// A pure predicate over a world.
pub trait Invariant {
    /// Name used in logs and reports.
    fn name(&self) -> &str;

    /// Whether the invariant holds in `world`.
    fn evaluate(&self, world: &World) -> bool;
}

/// Invariant backed by a closure.
pub struct FnInvariant<F> {
    name: String,
    predicate: F,
}

impl<F> Invariant for FnInvariant<F>
where
    F: Fn(&World) -> bool,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, world: &World) -> bool {
        (self.predicate)(world)
    }
}

impl<F> fmt::Debug for FnInvariant<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnInvariant")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Build a boxed invariant from a name and a predicate.
pub fn invariant<F>(name: impl Into<String>, predicate: F) -> Box<dyn Invariant>
where
    F: Fn(&World) -> bool + 'static,
{
    Box::new(FnInvariant {
        name: name.into(),
        predicate,
    })
}

/// Name of the first invariant that fails in `world`, if any.
pub(crate) fn first_violated<'a>(
    invariants: &'a [Box<dyn Invariant>],
    world: &World,
) -> Option<&'a str> {
    invariants
        .iter()
        .find(|inv| !inv.evaluate(world))
        .map(|inv| inv.name())
}
