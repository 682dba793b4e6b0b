//! Template rendering error types
//!
//! A template error is always scoped to one template, and usually to one
//! entity as well. The rendering pipeline records these per pair and carries
//! on with the remaining pairs.

use thiserror::Error;

/// Template syntax and rendering errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    /// Template content failed to parse
    #[error("Template '{template}' has a syntax error: {message}")]
    Syntax {
        /// Template code
        template: String,
        /// Parser message
        message: String,
    },

    /// Rendering failed for one entity
    #[error("Template '{template}' failed to render for entity '{entity}': {message}")]
    Render {
        /// Template code
        template: String,
        /// Entity code
        entity: String,
        /// Renderer message
        message: String,
    },

    /// Required template variables were not supplied
    #[error("Template '{template}' is missing required variables: {}", .names.join(", "))]
    MissingVariables {
        /// Template code
        template: String,
        /// Names of the missing variables
        names: Vec<String>,
    },

    /// Template could not be resolved
    #[error("Template '{0}' not found")]
    NotFound(String),
}

impl TemplateError {
    /// Returns true when the template or its inputs are at fault
    pub fn is_client_error(&self) -> bool {
        !matches!(self, TemplateError::NotFound(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TemplateError::NotFound(_))
    }

    /// Code of the template this error belongs to
    pub fn template(&self) -> &str {
        match self {
            TemplateError::Syntax { template, .. }
            | TemplateError::Render { template, .. }
            | TemplateError::MissingVariables { template, .. } => template,
            TemplateError::NotFound(template) => template,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_variables_message() {
        let err = TemplateError::MissingVariables {
            template: "service".into(),
            names: vec!["author".into(), "module".into()],
        };
        assert_eq!(
            err.to_string(),
            "Template 'service' is missing required variables: author, module"
        );
        assert_eq!(err.template(), "service");
    }
}
