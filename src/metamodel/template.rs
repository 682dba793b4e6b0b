//! Code templates and their version history
//!
//! A template owns an append-only list of versions. The current version is
//! the one whose number equals `version`; editing the content appends a new
//! version with the patch number advanced, and an edit that does not change
//! the content is a no-op.

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use strum::{Display, EnumString};

use crate::errors::{MetamodelError, MetamodelResult};
use crate::naming::{is_identifier, is_tag, is_template_code};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateStatus {
    #[default]
    Draft,
    Published,
    Deprecated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VariableKind {
    #[default]
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl VariableKind {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            VariableKind::String => value.is_string(),
            VariableKind::Number => value.is_number(),
            VariableKind::Boolean => value.is_boolean(),
            VariableKind::Array => value.is_array(),
            VariableKind::Object => value.is_object(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TemplateVariable {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: VariableKind,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default_value: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TemplateVersion {
    pub version: Version,
    pub content: String,
    #[serde(default)]
    pub variables: Vec<TemplateVariable>,
    #[serde(default)]
    pub changelog: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn initial_version() -> Version {
    Version::new(1, 0, 0)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Template {
    pub id: String,
    #[serde(default)]
    pub project_id: String,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub framework: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub content: String,
    #[serde(default)]
    pub variables: Vec<TemplateVariable>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "initial_version")]
    pub version: Version,
    #[serde(default)]
    pub status: TemplateStatus,
    #[serde(default)]
    pub versions: Vec<TemplateVersion>,
}

fn default_language() -> String {
    "typescript".to_string()
}

/// Checks that `{{` and `}}` occur the same number of times
pub fn braces_balanced(content: &str) -> bool {
    content.matches("{{").count() == content.matches("}}").count()
}

/// Validates variable names, uniqueness and default value kinds
pub fn validate_variables(variables: &[TemplateVariable]) -> MetamodelResult<()> {
    let mut seen = HashSet::new();
    for variable in variables {
        if !is_identifier(&variable.name) {
            return Err(MetamodelError::InvalidVariable {
                name: variable.name.clone(),
                reason: "name must be an identifier".into(),
            });
        }
        if !seen.insert(variable.name.as_str()) {
            return Err(MetamodelError::InvalidVariable {
                name: variable.name.clone(),
                reason: "duplicate name".into(),
            });
        }
        if let Some(default) = &variable.default_value {
            if !variable.kind.accepts(default) {
                return Err(MetamodelError::InvalidVariable {
                    name: variable.name.clone(),
                    reason: format!("default value is not of type {}", variable.kind),
                });
            }
        }
    }
    Ok(())
}

impl Template {
    pub fn new(
        project_id: impl Into<String>,
        name: impl Into<String>,
        code: impl Into<String>,
        language: impl Into<String>,
        content: impl Into<String>,
    ) -> MetamodelResult<Self> {
        let code = code.into();
        let content = content.into();
        if !is_template_code(&code) {
            return Err(MetamodelError::InvalidIdentifier(code));
        }
        if !braces_balanced(&content) {
            return Err(MetamodelError::UnbalancedBraces);
        }
        let mut template = Template {
            id: code.clone(),
            project_id: project_id.into(),
            name: name.into(),
            code,
            category: String::new(),
            language: language.into(),
            framework: None,
            description: None,
            content,
            variables: Vec::new(),
            tags: Vec::new(),
            version: initial_version(),
            status: TemplateStatus::Draft,
            versions: Vec::new(),
        };
        template.normalize();
        Ok(template)
    }

    /// Seeds the version history for templates loaded without one
    pub fn normalize(&mut self) {
        if self.versions.is_empty() {
            self.versions.push(TemplateVersion {
                version: self.version.clone(),
                content: self.content.clone(),
                variables: self.variables.clone(),
                changelog: Some("Initial version".to_string()),
                created_at: Utc::now(),
            });
        }
    }

    pub fn current(&self) -> Option<&TemplateVersion> {
        self.versions.iter().find(|v| v.version == self.version)
    }

    /// Replaces the content, appending a version when it actually changed.
    /// Returns whether a new version was created.
    pub fn update_content(
        &mut self,
        content: impl Into<String>,
        changelog: Option<String>,
    ) -> MetamodelResult<bool> {
        let content = content.into();
        if content == self.content {
            return Ok(false);
        }
        if !braces_balanced(&content) {
            return Err(MetamodelError::UnbalancedBraces);
        }
        let latest = self
            .versions
            .iter()
            .map(|v| &v.version)
            .max()
            .cloned()
            .unwrap_or_else(|| self.version.clone());
        let next = Version::new(latest.major, latest.minor, latest.patch + 1);

        self.versions.push(TemplateVersion {
            version: next.clone(),
            content: content.clone(),
            variables: self.variables.clone(),
            changelog,
            created_at: Utc::now(),
        });
        self.version = next;
        self.content = content;
        Ok(true)
    }

    /// Content of an earlier version
    pub fn checkout(&self, version: &str) -> MetamodelResult<&TemplateVersion> {
        let wanted =
            Version::parse(version).map_err(|_| MetamodelError::InvalidVersion(version.to_string()))?;
        self.versions
            .iter()
            .find(|v| v.version == wanted)
            .ok_or_else(|| MetamodelError::VersionNotFound(version.to_string()))
    }

    pub fn set_variables(&mut self, variables: Vec<TemplateVariable>) -> MetamodelResult<()> {
        validate_variables(&variables)?;
        self.variables = variables;
        Ok(())
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) -> MetamodelResult<()> {
        let tag = tag.into();
        if !is_tag(&tag) {
            return Err(MetamodelError::InvalidTag(tag));
        }
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        Ok(())
    }

    pub fn publish(&mut self) -> MetamodelResult<()> {
        if self.status == TemplateStatus::Published {
            return Err(MetamodelError::AlreadyPublished(self.code.clone()));
        }
        self.status = TemplateStatus::Published;
        Ok(())
    }

    pub fn deprecate(&mut self) -> MetamodelResult<()> {
        if self.status == TemplateStatus::Deprecated {
            return Err(MetamodelError::AlreadyDeprecated(self.code.clone()));
        }
        self.status = TemplateStatus::Deprecated;
        Ok(())
    }

    /// Required variables with no default that `supplied` does not provide
    pub fn missing_required_variables(&self, supplied: &Map<String, Value>) -> Vec<String> {
        self.variables
            .iter()
            .filter(|v| v.required && v.default_value.is_none())
            .filter(|v| supplied.get(&v.name).map_or(true, Value::is_null))
            .map(|v| v.name.clone())
            .collect()
    }

    /// Supplied variables layered over declared defaults
    pub fn resolve_variables(&self, supplied: &Map<String, Value>) -> Map<String, Value> {
        let mut resolved = Map::new();
        for variable in &self.variables {
            if let Some(default) = &variable.default_value {
                resolved.insert(variable.name.clone(), default.clone());
            }
        }
        for (key, value) in supplied {
            resolved.insert(key.clone(), value.clone());
        }
        resolved
    }
}
