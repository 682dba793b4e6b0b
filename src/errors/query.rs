//! Join query synthesis errors

use thiserror::Error;

use super::{RepositoryError, TemplateError};
use crate::validation::ValidationResult;

/// Errors returned by join query synthesis
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// The specification does not validate against the model
    #[error("Join query is invalid: {} violation(s)", .0.errors.len())]
    Invalid(ValidationResult),

    /// A generated artifact failed to render
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The model could not be loaded
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl QueryError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, QueryError::Invalid(_))
    }

    /// Validation report, when the specification was at fault
    pub fn report(&self) -> Option<&ValidationResult> {
        match self {
            QueryError::Invalid(report) => Some(report),
            QueryError::Template(_) | QueryError::Repository(_) => None,
        }
    }
}
