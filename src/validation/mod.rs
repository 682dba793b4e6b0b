//! Specification validation
//!
//! Validation is total: every independent problem becomes its own
//! [`Violation`] and nothing short-circuits. Checks run in a fixed order
//! (required scalars, identifier format, ranges, reference resolution,
//! uniqueness, join-graph connectivity) so reports are stable.

pub mod join_query;
pub mod model;

use serde::Serialize;
use std::fmt;
use strum::Display;

pub use join_query::validate_join_query;
pub use model::{validate_entities, validate_model};

/// Which rule a violation broke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Rule {
    Required,
    IdentifierFormat,
    Range,
    UnknownReference,
    CrossProject,
    Duplicate,
    ReservedName,
    Unreachable,
    JoinDisconnected,
    InvalidOperand,
    EmptyProjection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Dotted path of the offending attribute
    pub field: String,
    pub rule: Rule,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, rule: Rule, message: impl Into<String>) -> Self {
        Violation {
            field: field.into(),
            rule,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.field, self.rule, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<Violation>,
    pub warnings: Vec<String>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    pub fn new() -> Self {
        ValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn error(&mut self, field: impl Into<String>, rule: Rule, message: impl Into<String>) {
        self.errors.push(Violation::new(field, rule, message));
        self.valid = false;
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = Violation>) {
        for violation in errors {
            self.errors.push(violation);
            self.valid = false;
        }
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn has_rule(&self, rule: Rule) -> bool {
        self.errors.iter().any(|v| v.rule == rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_tracks_validity() {
        let mut result = ValidationResult::new();
        assert!(result.valid);
        result.warn("unused template");
        assert!(result.valid);
        result.error("entities.User.code", Rule::IdentifierFormat, "bad code");
        assert!(!result.valid);
        assert!(result.has_rule(Rule::IdentifierFormat));
        assert_eq!(
            result.errors[0].to_string(),
            "entities.User.code [identifier_format]: bad code"
        );
    }
}
