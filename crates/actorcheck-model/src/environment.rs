//! The mutable payload of a world: machines and their event queues.

use crate::error::HandlerError;
use crate::event::Event;
use crate::machine::{MachineId, StateMachine, StateTag};
use std::collections::{BTreeMap, VecDeque};
use std::str::FromStr;

/// Machines keyed by id, each with a FIFO queue of pending events.
///
/// Every machine has a queue entry, possibly empty. Both maps are ordered by
/// machine id, so iteration never depends on insertion order.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    machines: BTreeMap<MachineId, StateMachine>,
    queues: BTreeMap<MachineId, VecDeque<Event>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a machine with a queue holding only the startup event.
    /// Returns false (and leaves the environment unchanged) if the id is taken.
    pub fn spawn(&mut self, machine: StateMachine) -> bool {
        if self.machines.contains_key(machine.id()) {
            return false;
        }
        let id = machine.id().clone();
        self.queues.insert(id.clone(), VecDeque::from([Event::entry()]));
        self.machines.insert(id, machine);
        true
    }

    /// Add a machine with an empty queue. Returns false if the id is taken.
    pub fn add_machine(&mut self, machine: StateMachine) -> bool {
        if self.machines.contains_key(machine.id()) {
            return false;
        }
        let id = machine.id().clone();
        self.queues.insert(id.clone(), VecDeque::new());
        self.machines.insert(id, machine);
        true
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.machines.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    pub fn machine(&self, id: &str) -> Option<&StateMachine> {
        self.machines.get(id)
    }

    /// Machines in ascending id order.
    pub fn machines(&self) -> impl Iterator<Item = &StateMachine> {
        self.machines.values()
    }

    pub fn machine_ids(&self) -> impl Iterator<Item = &MachineId> {
        self.machines.keys()
    }

    /// Pending events of a machine, head first.
    pub fn queue(&self, id: &str) -> Option<&VecDeque<Event>> {
        self.queues.get(id)
    }

    /// All queues in ascending machine id order.
    pub fn queues(&self) -> impl Iterator<Item = (&MachineId, &VecDeque<Event>)> {
        self.queues.iter()
    }

    /// Total number of queued events across all machines.
    pub fn queued_events(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    /// Pop the head event of a machine's queue.
    pub fn dequeue_event(&mut self, id: &str) -> Option<Event> {
        self.queues.get_mut(id).and_then(VecDeque::pop_front)
    }

    /// Append an event to a machine's queue.
    pub fn send(&mut self, target: &str, event: Event) -> Result<(), HandlerError> {
        self.queues
            .get_mut(target)
            .ok_or_else(|| HandlerError::UnknownMachine(target.to_string()))?
            .push_back(event);
        Ok(())
    }

    /// Move a machine to another state.
    pub fn goto(&mut self, id: &str, state: impl Into<StateTag>) -> Result<(), HandlerError> {
        self.machine_mut(id)?.set_state(state.into());
        Ok(())
    }

    /// Halt a machine. A halted machine keeps draining its queue but no longer
    /// runs handlers.
    pub fn halt(&mut self, id: &str) -> Result<(), HandlerError> {
        self.machine_mut(id)?.halt();
        Ok(())
    }

    pub fn set_field(
        &mut self,
        id: &str,
        key: impl Into<String>,
        value: impl ToString,
    ) -> Result<(), HandlerError> {
        self.machine_mut(id)?.set_field(key.into(), value.to_string());
        Ok(())
    }

    /// Read a field that a handler expects to be present.
    pub fn require_field<T: FromStr>(&self, id: &str, key: &str) -> Result<T, HandlerError> {
        self.machine(id)
            .ok_or_else(|| HandlerError::UnknownMachine(id.to_string()))?
            .field_as(key)
            .ok_or_else(|| HandlerError::MissingField {
                machine: id.to_string(),
                field: key.to_string(),
            })
    }

    fn machine_mut(&mut self, id: &str) -> Result<&mut StateMachine, HandlerError> {
        self.machines
            .get_mut(id)
            .ok_or_else(|| HandlerError::UnknownMachine(id.to_string()))
    }
}

/// One outcome of a local step.
#[derive(Debug, Clone)]
pub struct LocalState {
    env: Environment,
}

impl LocalState {
    pub fn new(env: Environment) -> Self {
        Self { env }
    }

    #[inline]
    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn into_env(self) -> Environment {
        self.env
    }
}

impl From<Environment> for LocalState {
    fn from(env: Environment) -> Self {
        LocalState::new(env)
    }
}
