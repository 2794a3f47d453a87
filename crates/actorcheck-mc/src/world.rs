//! World representation and fingerprinting.

use actorcheck_model::Environment;
use std::fmt::{self, Write as _};
use std::hash::BuildHasher;

/// Fixed hasher seeds so fingerprints are stable across runs of the same build.
const SEEDS: [u64; 4] = [
    0x2d35_8dcc_aa6c_78a5,
    0x9e37_79b9_7f4a_7c15,
    0x517c_c1b7_2722_0a95,
    0xcbf2_9ce4_8422_2325,
];

/// A 64-bit fingerprint identifying a world.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorldId(u64);

impl WorldId {
    /// Fingerprint of an environment's semantic content.
    pub fn of(env: &Environment) -> Self {
        Self::of_key(&canonical_key(env))
    }

    fn of_key(key: &str) -> Self {
        let state = ahash::RandomState::with_seeds(SEEDS[0], SEEDS[1], SEEDS[2], SEEDS[3]);
        WorldId(BuildHasher::hash_one(&state, key))
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn from_u64(v: u64) -> Self {
        WorldId(v)
    }
}

impl fmt::Debug for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorldId({:016x})", self.0)
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Canonical text of an environment, the input to the fingerprint.
///
/// Every component is written length-prefixed (`len:text`), so user text
/// containing separators cannot make two environments encode alike. Machines
/// come first in id order (`M` id, state name, state detail, `H`/`R`, field
/// count, then each key and value), then queued events per machine in queue
/// order (`E` id, position, name, detail). The position keeps queue order
/// significant.
pub fn canonical_key(env: &Environment) -> String {
    let mut key = String::new();
    for m in env.machines() {
        key.push('M');
        push_component(&mut key, m.id());
        push_component(&mut key, m.state().name());
        push_component(&mut key, m.state().detail());
        key.push(if m.is_halted() { 'H' } else { 'R' });
        let fields: Vec<(&str, &str)> = m.fields().collect();
        let _ = write!(key, "{};", fields.len());
        for (k, v) in fields {
            push_component(&mut key, k);
            push_component(&mut key, v);
        }
    }
    for (id, events) in env.queues() {
        for (pos, e) in events.iter().enumerate() {
            key.push('E');
            push_component(&mut key, id);
            let _ = write!(key, "{};", pos);
            push_component(&mut key, e.name());
            push_component(&mut key, e.detail());
        }
    }
    key
}

fn push_component(key: &mut String, text: &str) {
    let _ = write!(key, "{}:", text.len());
    key.push_str(text);
}

/// A global snapshot: an environment, its identity and the violation flag.
#[derive(Debug, Clone)]
pub struct World {
    id: WorldId,
    env: Environment,
    /// Canonical text the id was computed from, kept to detect collisions.
    key: String,
    violates_invariant: bool,
}

impl World {
    pub fn new(env: Environment) -> Self {
        let key = canonical_key(&env);
        Self {
            id: WorldId::of_key(&key),
            env,
            key,
            violates_invariant: false,
        }
    }

    /// Create a world with a forced id, for exercising collision handling.
    #[cfg(test)]
    pub(crate) fn with_id(env: Environment, id: WorldId) -> Self {
        let key = canonical_key(&env);
        Self {
            id,
            env,
            key,
            violates_invariant: false,
        }
    }

    #[inline]
    pub fn id(&self) -> WorldId {
        self.id
    }

    #[inline]
    pub fn env(&self) -> &Environment {
        &self.env
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub fn violates_invariant(&self) -> bool {
        self.violates_invariant
    }

    pub(crate) fn mark_violation(&mut self) {
        self.violates_invariant = true;
    }

    /// Multi-line summary of machines and queued events, used as a graph label.
    pub fn label(&self) -> String {
        let mut lines = vec!["StateMachines:".to_string()];
        for m in self.env.machines() {
            lines.push(format!(
                "* {}={};{}",
                display_name(m.name(), m.id()),
                m.details(),
                m.state()
            ));
        }
        lines.push(String::new());
        lines.push("QueuedEvents:".to_string());
        for (id, events) in self.env.queues() {
            let name = self
                .env
                .machine(id)
                .map(|m| display_name(m.name(), id))
                .unwrap_or_else(|| id.to_string());
            for e in events {
                lines.push(format!("* {}<<{};{}", name, e.name(), e.detail()));
            }
        }
        lines.join("\n")
    }
}

/// Name shown in reports: the machine kind, qualified by id when they differ.
pub(crate) fn display_name(name: &str, id: &str) -> String {
    if name == id {
        name.to_string()
    } else {
        format!("{}({})", name, id)
    }
}
