//! Local and global transition relations.

use crate::world::World;
use actorcheck_model::{Environment, Handler, HandlerError, LocalState, MachineId};
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

/// Failure while advancing a machine.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("handler for event '{event}' on machine '{machine}' failed: {source}")]
    Handler {
        machine: MachineId,
        event: String,
        #[source]
        source: HandlerError,
    },

    #[error("unknown machine '{0}'")]
    UnknownMachine(MachineId),
}

/// Advance one machine by one queued event.
///
/// The caller's environment is never modified. Returns no outcomes when the
/// machine's queue is empty. A halted machine, or an event no handler of the
/// current state accepts, yields the environment after the dequeue. Otherwise
/// every accepting handler runs on its own copy and all of their outcomes are
/// returned in registration order.
pub fn step_local(env: &Environment, id: &MachineId) -> Result<Vec<LocalState>, StepError> {
    let mut next = env.clone();
    let Some(event) = next.dequeue_event(id) else {
        return Ok(Vec::new());
    };

    let machine = next
        .machine(id)
        .ok_or_else(|| StepError::UnknownMachine(id.clone()))?;
    if machine.is_halted() {
        trace!(machine = %id, event = event.name(), "halted machine drops event");
        return Ok(vec![LocalState::new(next)]);
    }

    let handlers: Vec<Arc<dyn Handler>> = machine
        .spec()
        .handlers_for(machine.state())
        .unwrap_or_default()
        .iter()
        .filter(|entry| entry.accepts(&event))
        .map(|entry| Arc::clone(entry.handler()))
        .collect();

    let mut outcomes = Vec::new();
    for handler in handlers {
        let states = handler
            .handle(next.clone(), id, &event)
            .map_err(|source| StepError::Handler {
                machine: id.clone(),
                event: event.name().to_string(),
                source,
            })?;
        outcomes.extend(states);
    }

    if outcomes.is_empty() {
        trace!(machine = %id, event = event.name(), "no handler accepted event");
        return Ok(vec![LocalState::new(next)]);
    }
    Ok(outcomes)
}

/// Successor worlds: every local step of every machine, in machine id order.
pub fn step_global(world: &World) -> Result<Vec<World>, StepError> {
    let env = world.env();
    let mut successors = Vec::new();
    for id in env.machine_ids() {
        for state in step_local(env, id)? {
            successors.push(World::new(state.into_env()));
        }
    }
    Ok(successors)
}
