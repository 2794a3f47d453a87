//! Errors raised by event handlers.

use crate::environment::LocalState;
use thiserror::Error;

/// Failure reported by a handler while reacting to an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("unknown machine '{0}'")]
    UnknownMachine(String),

    #[error("missing field '{field}' on machine '{machine}'")]
    MissingField { machine: String, field: String },

    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

/// Outcomes of a single handler invocation.
pub type HandlerResult = Result<Vec<LocalState>, HandlerError>;
