//! Metamodel lifecycle errors
//!
//! Raised by the lifecycle methods on entities and templates (publish,
//! deprecate, version edits) and by constructors that enforce field-level
//! invariants.

use thiserror::Error;

/// Metamodel invariant and lifecycle errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetamodelError {
    /// A code does not match the identifier pattern
    #[error("Invalid identifier '{0}': must start with a letter and contain only letters, digits and underscores")]
    InvalidIdentifier(String),

    /// Required attribute is empty
    #[error("Missing required attribute: {0}")]
    MissingAttribute(&'static str),

    /// Object is already published
    #[error("'{0}' is already published")]
    AlreadyPublished(String),

    /// Object is already deprecated
    #[error("'{0}' is already deprecated")]
    AlreadyDeprecated(String),

    /// Only draft objects may be deleted
    #[error("'{0}' can only be deleted while in draft")]
    NotDeletable(String),

    /// A numeric attribute is outside its allowed range
    #[error("{attribute} out of range: {value}")]
    OutOfRange {
        /// Attribute name
        attribute: &'static str,
        /// Offending value
        value: i64,
    },

    /// Template variable definition is invalid
    #[error("Invalid template variable '{name}': {reason}")]
    InvalidVariable {
        /// Variable name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Template tag is invalid
    #[error("Invalid template tag '{0}'")]
    InvalidTag(String),

    /// Template content has unbalanced braces
    #[error("Template content has unmatched '{{{{' or '}}}}'")]
    UnbalancedBraces,

    /// Requested template version does not exist
    #[error("Template version {0} not found")]
    VersionNotFound(String),

    /// Version string could not be parsed
    #[error("Invalid version '{0}'")]
    InvalidVersion(String),
}

impl MetamodelError {
    /// Returns true when the caller supplied bad data or asked for an illegal transition
    pub fn is_client_error(&self) -> bool {
        !matches!(self, MetamodelError::VersionNotFound(_))
    }

    /// Returns true for lookups that found nothing
    pub fn is_not_found(&self) -> bool {
        matches!(self, MetamodelError::VersionNotFound(_))
    }
}
