//! Authoring layer for actorcheck models.
//!
//! A model is a set of [`StateMachine`]s living in an [`Environment`]. Each
//! machine carries a shared [`MachineSpec`] handler table mapping a state name
//! to the ordered handlers guarded by an event name. Handlers receive their own
//! copy of the environment and return one or more [`LocalState`]s, so a single
//! event can fork the model into several outcomes.

pub mod environment;
pub mod error;
pub mod event;
pub mod machine;

pub use environment::{Environment, LocalState};
pub use error::{HandlerError, HandlerResult};
pub use event::Event;
pub use machine::{
    Handler, HandlerEntry, MachineId, MachineSpec, MachineSpecBuilder, StateMachine, StateTag,
};
