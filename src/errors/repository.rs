use thiserror::Error;

/// Metamodel repository lookup errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    /// Object not found by id or code
    #[error("{kind} '{id}' not found")]
    NotFound {
        /// Kind of object (entity, template, relationship)
        kind: &'static str,
        /// Identifier used for the lookup
        id: String,
    },

    /// The backing store failed
    #[error("Repository backend error: {0}")]
    Backend(String),
}

impl RepositoryError {
    pub fn entity(id: impl Into<String>) -> Self {
        RepositoryError::NotFound {
            kind: "Entity",
            id: id.into(),
        }
    }

    pub fn template(id: impl Into<String>) -> Self {
        RepositoryError::NotFound {
            kind: "Template",
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound { .. })
    }
}
