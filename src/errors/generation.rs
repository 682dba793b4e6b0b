//! Fatal generation errors
//!
//! These are contract violations detected before any rendering or writing
//! starts. Everything that can go wrong per template, per entity or per file
//! is collected into the generation result instead.

use thiserror::Error;

use super::{RepositoryError, TaskError};

/// Request-level errors returned as `Err` from the service facade
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    /// A required list in the request is empty
    #[error("Request field '{0}' must not be empty")]
    EmptyRequest(String),

    /// Output directory is required unless running dry
    #[error("Output directory is required when not running dry")]
    MissingOutputDirectory,

    /// Repository lookup failed
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Task bookkeeping failed
    #[error(transparent)]
    Task(#[from] TaskError),

    /// Worker pool failure
    #[error("Generation worker failed: {0}")]
    Worker(String),
}

impl GenerationError {
    pub fn is_client_error(&self) -> bool {
        match self {
            GenerationError::EmptyRequest(_) | GenerationError::MissingOutputDirectory => true,
            GenerationError::Repository(e) => e.is_not_found(),
            GenerationError::Task(e) => e.is_client_error(),
            GenerationError::Worker(_) => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            GenerationError::Repository(e) => e.is_not_found(),
            GenerationError::Task(e) => e.is_not_found(),
            _ => false,
        }
    }
}
