//! Generation task error types

use thiserror::Error;

use crate::metamodel::TaskStatus;

/// Errors raised by generation task transitions and the task actor
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    /// Transition is not allowed from the current status
    #[error("Cannot {action} task in status {from}")]
    InvalidTransition {
        /// Status the task was in
        from: TaskStatus,
        /// Attempted transition
        action: &'static str,
    },

    /// Progress outside [0, 100]
    #[error("Progress must be between 0 and 100, got {0}")]
    ProgressOutOfRange(i64),

    /// Required attribute missing on creation
    #[error("Missing required task attribute: {0}")]
    MissingAttribute(&'static str),

    /// Unknown task id
    #[error("Task '{0}' not found")]
    NotFound(String),

    /// The owning actor has shut down
    #[error("Task actor unavailable")]
    ActorUnavailable,
}

impl TaskError {
    pub fn is_client_error(&self) -> bool {
        !matches!(self, TaskError::ActorUnavailable)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TaskError::NotFound(_))
    }
}
