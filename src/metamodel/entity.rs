use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::field::{common_fields, Field};
use super::relationship::Relationship;
use crate::errors::{MetamodelError, MetamodelResult};
use crate::naming::{is_identifier, to_snake_case};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityStatus {
    #[default]
    Draft,
    Published,
    Deprecated,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// A business entity and the fields it owns
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: String,
    #[serde(default)]
    pub project_id: String,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: EntityStatus,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Entity {
    pub fn new(
        project_id: impl Into<String>,
        name: impl Into<String>,
        code: impl Into<String>,
    ) -> MetamodelResult<Self> {
        let project_id = project_id.into();
        let name = name.into();
        let code = code.into();
        if project_id.trim().is_empty() {
            return Err(MetamodelError::MissingAttribute("project_id"));
        }
        if name.trim().is_empty() {
            return Err(MetamodelError::MissingAttribute("name"));
        }
        if !is_identifier(&code) {
            return Err(MetamodelError::InvalidIdentifier(code));
        }
        Ok(Entity {
            id: code.clone(),
            project_id,
            name,
            code,
            table_name: None,
            description: None,
            category: None,
            status: EntityStatus::Draft,
            version: default_version(),
            fields: Vec::new(),
            relationships: Vec::new(),
        })
    }

    /// Explicit table name, or the snake_case form of the code
    pub fn table_name(&self) -> String {
        match &self.table_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => to_snake_case(&self.code),
        }
    }

    pub fn publish(&mut self) -> MetamodelResult<()> {
        if self.status == EntityStatus::Published {
            return Err(MetamodelError::AlreadyPublished(self.code.clone()));
        }
        self.status = EntityStatus::Published;
        Ok(())
    }

    pub fn deprecate(&mut self) -> MetamodelResult<()> {
        if self.status == EntityStatus::Deprecated {
            return Err(MetamodelError::AlreadyDeprecated(self.code.clone()));
        }
        self.status = EntityStatus::Deprecated;
        Ok(())
    }

    pub fn can_delete(&self) -> bool {
        self.status == EntityStatus::Draft
    }

    pub fn ensure_deletable(&self) -> MetamodelResult<()> {
        if self.can_delete() {
            Ok(())
        } else {
            Err(MetamodelError::NotDeletable(self.code.clone()))
        }
    }

    pub fn field(&self, field_id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == field_id)
    }

    pub fn field_by_code(&self, code: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.code == code)
    }

    /// Fields ordered by display order
    pub fn sorted_fields(&self) -> Vec<&Field> {
        let mut fields: Vec<&Field> = self.fields.iter().collect();
        fields.sort_by_key(|f| f.display_order);
        fields
    }

    pub fn business_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.is_common)
    }

    pub fn common_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_common)
    }

    pub fn primary_key(&self) -> Option<&Field> {
        self.fields
            .iter()
            .find(|f| f.is_common && f.code == "id")
            .or_else(|| self.fields.iter().find(|f| f.unique && f.required))
    }

    /// Adds whichever common fields are missing; business fields keep their order
    pub fn ensure_common_fields(&mut self) {
        let missing: Vec<Field> = common_fields(&self.id)
            .into_iter()
            .filter(|c| !self.fields.iter().any(|f| f.is_common && f.code == c.code))
            .collect();
        self.fields.extend(missing);
    }

    /// Next display order for a business field, placed after every existing field
    pub fn next_display_order(&self) -> i64 {
        self.fields
            .iter()
            .map(|f| f.display_order)
            .max()
            .unwrap_or(0)
            .max(common_fields(&self.id).len() as i64)
            + 1
    }

    pub fn add_field(&mut self, mut field: Field) {
        field.entity_id = self.id.clone();
        self.fields.push(field);
    }
}
