//! World arena and accessibility relation.

use crate::world::{World, WorldId};
use indexmap::map::Entry;
use indexmap::IndexMap;
use tracing::error;

/// Explored worlds keyed by fingerprint, plus the edges between them.
///
/// Both maps keep insertion order, so iteration follows discovery order and
/// reports are reproducible.
#[derive(Debug, Default)]
pub struct WorldStore {
    worlds: IndexMap<WorldId, World>,
    /// Successor ids per explored world, in generation order. Duplicates are
    /// kept: two interleavings reaching the same world are two edges.
    accessible: IndexMap<WorldId, Vec<WorldId>>,
    /// Distinct worlds found sharing a fingerprint with a stored world.
    collisions: usize,
}

impl WorldStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn contains(&self, id: &WorldId) -> bool {
        self.worlds.contains_key(id)
    }

    /// Insert a world if its id is new. Returns true if the world was new.
    ///
    /// On an id match the canonical keys are compared; a mismatch is a
    /// fingerprint collision and the new world is dropped.
    pub fn insert(&mut self, world: &World) -> bool {
        match self.worlds.entry(world.id()) {
            Entry::Occupied(occupied) => {
                if occupied.get().key() != world.key() {
                    self.collisions += 1;
                    if self.collisions == 1 {
                        error!(
                            fingerprint = %world.id(),
                            "hash collision detected: different worlds share fingerprint, results may be unsound"
                        );
                    }
                }
                false
            }
            Entry::Vacant(vacant) => {
                vacant.insert(world.clone());
                true
            }
        }
    }

    #[inline]
    pub fn get(&self, id: &WorldId) -> Option<&World> {
        self.worlds.get(id)
    }

    /// Flag a stored world as violating an invariant.
    pub(crate) fn mark_violation(&mut self, id: &WorldId) {
        if let Some(world) = self.worlds.get_mut(id) {
            world.mark_violation();
        }
    }

    pub(crate) fn set_successors(&mut self, id: WorldId, successors: Vec<WorldId>) {
        self.accessible.insert(id, successors);
    }

    /// Successors of a world; empty for terminal or unexplored worlds.
    pub fn successors(&self, id: &WorldId) -> &[WorldId] {
        self.accessible.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Worlds in discovery order.
    pub fn worlds(&self) -> impl Iterator<Item = &World> {
        self.worlds.values()
    }

    /// Accessibility entries in exploration order.
    pub fn edges(&self) -> impl Iterator<Item = (WorldId, &[WorldId])> {
        self.accessible.iter().map(|(id, succ)| (*id, succ.as_slice()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.worlds.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.worlds.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.accessible.values().map(Vec::len).sum()
    }

    pub fn violation_count(&self) -> usize {
        self.worlds.values().filter(|w| w.violates_invariant()).count()
    }

    #[inline]
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    pub fn clear(&mut self) {
        self.worlds.clear();
        self.accessible.clear();
        self.collisions = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actorcheck_model::{Environment, MachineSpec, StateMachine};

    fn world(state: &str) -> World {
        let spec = MachineSpec::builder("M", "A").build();
        let mut env = Environment::new();
        env.spawn(StateMachine::new("m", spec));
        env.goto("m", state).unwrap();
        World::new(env)
    }

    #[test]
    fn test_store_insert() {
        let mut store = WorldStore::new();
        let a = world("A");
        let b = world("B");

        assert!(store.insert(&a));
        assert!(!store.insert(&a)); // duplicate
        assert!(!store.insert(&world("A"))); // built independently
        assert!(store.insert(&b));

        assert_eq!(store.len(), 2);
        assert_eq!(store.collisions(), 0);
        let order: Vec<WorldId> = store.worlds().map(World::id).collect();
        assert_eq!(order, vec![a.id(), b.id()]);
    }

    #[test]
    fn test_collision_detected() {
        let mut store = WorldStore::new();
        let a = world("A");
        let forged = World::with_id(world("B").env().clone(), a.id());

        assert!(store.insert(&a));
        assert!(!store.insert(&forged));
        assert_eq!(store.len(), 1);
        assert_eq!(store.collisions(), 1);
        assert_eq!(store.get(&a.id()).unwrap().key(), a.key());
    }

    #[test]
    fn test_successors_and_violations() {
        let mut store = WorldStore::new();
        let a = world("A");
        let b = world("B");
        store.insert(&a);
        store.insert(&b);
        store.set_successors(a.id(), vec![b.id(), b.id()]);
        store.set_successors(b.id(), vec![]);
        store.mark_violation(&b.id());

        assert_eq!(store.successors(&a.id()), &[b.id(), b.id()]);
        assert!(store.successors(&b.id()).is_empty());
        assert!(store.successors(&WorldId::from_u64(7)).is_empty());
        assert_eq!(store.edge_count(), 2);
        assert_eq!(store.violation_count(), 1);
        assert!(store.get(&b.id()).unwrap().violates_invariant());

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.edge_count(), 0);
    }
}
