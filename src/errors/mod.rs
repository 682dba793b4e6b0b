//! Domain-specific error types for modelforge
//!
//! Each stage of the generation pipeline has its own error enum so callers can
//! tell a bad specification apart from a broken template or a failed write.
//!
//! # Error Categories
//!
//! - **MetamodelError**: lifecycle and invariant violations on metamodel objects
//! - **RepositoryError**: lookups against the metamodel repository
//! - **TemplateError**: template syntax and rendering failures, per template/entity pair
//! - **MaterializeError**: filesystem failures, per file
//! - **TaskError**: illegal generation task transitions
//! - **QueryError**: join query synthesis, wrapping the validation report
//! - **GenerationError**: fatal request errors raised before any work starts
//!
//! Specification problems are never errors: they are reported as
//! [`crate::validation::Violation`] values inside a validation result.
//!
//! # Examples
//!
//! ```rust
//! use modelforge::errors::{TaskError, TemplateError};
//!
//! let err = TemplateError::Syntax {
//!     template: "entity".to_string(),
//!     message: "unclosed block".to_string(),
//! };
//! assert!(err.is_client_error());
//!
//! let err = TaskError::ProgressOutOfRange(120);
//! assert!(err.is_client_error());
//! ```

pub mod generation;
pub mod materialize;
pub mod metamodel;
pub mod query;
pub mod repository;
pub mod task;
pub mod template;

pub use generation::GenerationError;
pub use materialize::MaterializeError;
pub use metamodel::MetamodelError;
pub use query::QueryError;
pub use repository::RepositoryError;
pub use task::TaskError;
pub use template::TemplateError;

/// Result type alias for metamodel operations
pub type MetamodelResult<T> = Result<T, MetamodelError>;

/// Result type alias for repository lookups
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Result type alias for template rendering
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Result type alias for file materialisation
pub type MaterializeResult<T> = Result<T, MaterializeError>;

/// Result type alias for task transitions
pub type TaskResult<T> = Result<T, TaskError>;

/// Result type alias for join query synthesis
pub type QueryResult<T> = Result<T, QueryError>;

/// Result type alias for generation requests
pub type GenerationResult<T> = Result<T, GenerationError>;
