use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Output directory layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Architecture {
    /// Every artifact under `src/<folder>/`
    #[default]
    Flat,
    /// Generated base layer under `src/base/`, editable business layer under `src/biz/`
    #[serde(alias = "base-biz")]
    Layered,
}

/// What to do with a join query that selects no fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmptyProjectionPolicy {
    /// Select every base column and record a warning
    #[default]
    Warn,
    /// Report a violation
    Reject,
}

/// Options shared by code generation and query synthesis
///
/// Unknown keys are ignored; camelCase spellings are accepted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GenerationOptions {
    #[serde(alias = "overwriteExisting")]
    pub overwrite_existing: bool,
    #[serde(alias = "generateTests")]
    pub generate_tests: bool,
    #[serde(alias = "generateDocs")]
    pub generate_docs: bool,
    pub architecture: Architecture,
    pub framework: String,
    #[serde(alias = "dryRun")]
    pub dry_run: bool,
    /// Missing template keys become render errors
    #[serde(alias = "strictTemplates")]
    pub strict_templates: bool,
    /// Existing files are failures rather than skips
    #[serde(alias = "strictConflicts")]
    pub strict_conflicts: bool,
    #[serde(alias = "emptyProjection")]
    pub empty_projection: EmptyProjectionPolicy,
    #[serde(alias = "writeTimeoutSecs")]
    pub write_timeout_secs: u64,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        GenerationOptions {
            overwrite_existing: false,
            generate_tests: false,
            generate_docs: false,
            architecture: Architecture::Flat,
            framework: "nestjs".to_string(),
            dry_run: false,
            strict_templates: false,
            strict_conflicts: false,
            empty_projection: EmptyProjectionPolicy::Warn,
            write_timeout_secs: 10,
        }
    }
}
