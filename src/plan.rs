use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::metamodel::JoinQuerySpec;
use crate::options::GenerationOptions;

/// ## Structure
/// This module contains the data structures for the plan file.
///
/// ```text
/// Plan
///   ├── meta: Option<Meta>
///   │   └── name: Option<String>
///   ├── model: String                      model file, relative to the plan
///   ├── generation: Option<GenerationProfile>
///   │   ├── entities: Vec<String>          empty means every entity in the model
///   │   ├── templates: Vec<String>         empty means the default set
///   │   ├── output: String
///   │   ├── variables: Map<String, Value>
///   │   └── options: GenerationOptions
///   │       ├── overwrite_existing, generate_tests, generate_docs
///   │       ├── architecture: flat | layered
///   │       ├── framework, dry_run
///   │       └── strict_templates, strict_conflicts, empty_projection, write_timeout_secs
///   └── join_queries: Vec<JoinQueryProfile>
///       ├── spec: JoinQuerySpec
///       └── output: Option<String>         directory for the query artifacts
/// ```
///

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Meta {
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Plan {
    #[serde(default)]
    pub meta: Option<Meta>,
    pub model: String,
    #[serde(default)]
    pub generation: Option<GenerationProfile>,
    #[serde(default)]
    pub join_queries: Vec<JoinQueryProfile>,
}

impl Default for Plan {
    fn default() -> Self {
        Plan {
            meta: Some(Meta {
                name: Some("modelforge plan".to_string()),
            }),
            model: "model.yaml".to_string(),
            generation: Some(GenerationProfile::default()),
            join_queries: Vec::new(),
        }
    }
}

//
// Code generation
//

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GenerationProfile {
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub templates: Vec<String>,
    pub output: String,
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default)]
    pub options: GenerationOptions,
}

impl Default for GenerationProfile {
    fn default() -> Self {
        GenerationProfile {
            entities: Vec::new(),
            templates: Vec::new(),
            output: "generated".to_string(),
            variables: Map::new(),
            options: GenerationOptions::default(),
        }
    }
}

//
// Join queries
//

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JoinQueryProfile {
    pub spec: JoinQuerySpec,
    #[serde(default)]
    pub output: Option<String>,
}
