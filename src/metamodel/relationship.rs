use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::config_value::{ConfigValue, JoinTableConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferentialAction {
    Cascade,
    SetNull,
    #[default]
    Restrict,
    NoAction,
}

impl ReferentialAction {
    pub fn sql(&self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: String,
    #[serde(default)]
    pub project_id: String,
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,
    pub source_entity_id: String,
    pub target_entity_id: String,
    #[serde(default)]
    pub source_field_id: Option<String>,
    #[serde(default)]
    pub target_field_id: Option<String>,
    #[serde(default)]
    pub foreign_key_name: Option<String>,
    #[serde(default)]
    pub on_delete: ReferentialAction,
    #[serde(default)]
    pub on_update: ReferentialAction,
    #[serde(default)]
    pub config: Option<ConfigValue<JoinTableConfig>>,
}

impl Relationship {
    /// Whether this relationship touches `entity_id` at either end
    pub fn involves(&self, entity_id: &str) -> bool {
        self.source_entity_id == entity_id || self.target_entity_id == entity_id
    }

    /// The entity on the other end, if `entity_id` is one of the two ends
    pub fn other_end(&self, entity_id: &str) -> Option<&str> {
        if self.source_entity_id == entity_id {
            Some(&self.target_entity_id)
        } else if self.target_entity_id == entity_id {
            Some(&self.source_entity_id)
        } else {
            None
        }
    }

    pub fn join_table(&self) -> Option<&JoinTableConfig> {
        self.config.as_ref().and_then(ConfigValue::known)
    }
}
