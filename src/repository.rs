//! Read-only access to the metamodel
//!
//! Generation and synthesis never own the metamodel; they read it through
//! [`MetamodelRepository`]. [`InMemoryRepository`] is backed by a
//! [`MetamodelSnapshot`], usually loaded from the `model` file of a plan.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::{RepositoryError, RepositoryResult};
use crate::metamodel::{Entity, Relationship, Template, TemplateStatus};

/// Narrows `list_templates`; `None` matches anything
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct TemplateFilter {
    pub project_id: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub framework: Option<String>,
    pub tag: Option<String>,
    pub status: Option<TemplateStatus>,
}

impl TemplateFilter {
    pub fn matches(&self, template: &Template) -> bool {
        let eq = |wanted: &Option<String>, actual: &str| {
            wanted.as_deref().map_or(true, |w| w.eq_ignore_ascii_case(actual))
        };
        eq(&self.project_id, &template.project_id)
            && eq(&self.category, &template.category)
            && eq(&self.language, &template.language)
            && self.framework.as_deref().map_or(true, |w| {
                template
                    .framework
                    .as_deref()
                    .map_or(false, |f| f.eq_ignore_ascii_case(w))
            })
            && self.tag.as_ref().map_or(true, |t| template.tags.contains(t))
            && self.status.map_or(true, |s| s == template.status)
    }
}

#[async_trait]
pub trait MetamodelRepository: Send + Sync {
    async fn get_entity(&self, id: &str) -> RepositoryResult<Entity>;

    async fn list_entities_by_project(&self, project_id: &str) -> RepositoryResult<Vec<Entity>>;

    /// Relationships with `entity_id` at either end
    async fn get_relationships_for_entity(&self, entity_id: &str) -> RepositoryResult<Vec<Relationship>>;

    /// Looks a template up by id, then by code
    async fn get_template(&self, id_or_code: &str) -> RepositoryResult<Template>;

    async fn list_templates(&self, filter: &TemplateFilter) -> RepositoryResult<Vec<Template>>;
}

/// A whole metamodel as stored in a model file
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct MetamodelSnapshot {
    pub project_id: String,
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    pub templates: Vec<Template>,
}

impl MetamodelSnapshot {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut snapshot: MetamodelSnapshot =
            serde_yaml::from_str(yaml).context("Failed to parse model")?;
        snapshot.normalize();
        Ok(snapshot)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model file {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid model file {}", path.display()))
    }

    /// Fills the ids a hand-written model leaves implicit.
    ///
    /// Entities, relationships and templates inherit the snapshot's project,
    /// fields inherit their entity, relationships declared inside an entity
    /// join the top-level list, and templates get their first version.
    pub fn normalize(&mut self) {
        let mut known: HashSet<String> = self.relationships.iter().map(|r| r.id.clone()).collect();
        let mut nested = Vec::new();

        for entity in &mut self.entities {
            if entity.project_id.is_empty() {
                entity.project_id = self.project_id.clone();
            }
            for field in &mut entity.fields {
                if field.entity_id.is_empty() {
                    field.entity_id = entity.id.clone();
                }
            }
            for relationship in entity.relationships.drain(..) {
                if known.insert(relationship.id.clone()) {
                    nested.push(relationship);
                }
            }
        }
        self.relationships.extend(nested);

        for relationship in &mut self.relationships {
            if relationship.project_id.is_empty() {
                relationship.project_id = self.project_id.clone();
            }
        }
        for template in &mut self.templates {
            if template.project_id.is_empty() {
                template.project_id = self.project_id.clone();
            }
            template.normalize();
        }
    }
}

/// Repository over a snapshot held in memory
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    snapshot: Arc<RwLock<MetamodelSnapshot>>,
}

impl InMemoryRepository {
    pub fn new(mut snapshot: MetamodelSnapshot) -> Self {
        snapshot.normalize();
        debug!(
            "Repository loaded with {} entities, {} relationships, {} templates",
            snapshot.entities.len(),
            snapshot.relationships.len(),
            snapshot.templates.len()
        );
        InMemoryRepository {
            snapshot: Arc::new(RwLock::new(snapshot)),
        }
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(MetamodelSnapshot::from_yaml_file(path)?))
    }

    /// Copy of everything the repository holds
    pub async fn snapshot(&self) -> MetamodelSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn upsert_entity(&self, entity: Entity) {
        let mut snapshot = self.snapshot.write().await;
        match snapshot.entities.iter_mut().find(|e| e.id == entity.id) {
            Some(existing) => *existing = entity,
            None => snapshot.entities.push(entity),
        }
    }

    pub async fn upsert_relationship(&self, relationship: Relationship) {
        let mut snapshot = self.snapshot.write().await;
        match snapshot.relationships.iter_mut().find(|r| r.id == relationship.id) {
            Some(existing) => *existing = relationship,
            None => snapshot.relationships.push(relationship),
        }
    }

    pub async fn upsert_template(&self, mut template: Template) {
        template.normalize();
        let mut snapshot = self.snapshot.write().await;
        match snapshot.templates.iter_mut().find(|t| t.id == template.id) {
            Some(existing) => *existing = template,
            None => snapshot.templates.push(template),
        }
    }
}

#[async_trait]
impl MetamodelRepository for InMemoryRepository {
    async fn get_entity(&self, id: &str) -> RepositoryResult<Entity> {
        self.snapshot
            .read()
            .await
            .entities
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| RepositoryError::entity(id))
    }

    async fn list_entities_by_project(&self, project_id: &str) -> RepositoryResult<Vec<Entity>> {
        Ok(self
            .snapshot
            .read()
            .await
            .entities
            .iter()
            .filter(|e| e.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn get_relationships_for_entity(&self, entity_id: &str) -> RepositoryResult<Vec<Relationship>> {
        let snapshot = self.snapshot.read().await;
        if !snapshot.entities.iter().any(|e| e.id == entity_id) {
            return Err(RepositoryError::entity(entity_id));
        }
        Ok(snapshot
            .relationships
            .iter()
            .filter(|r| r.involves(entity_id))
            .cloned()
            .collect())
    }

    async fn get_template(&self, id_or_code: &str) -> RepositoryResult<Template> {
        let snapshot = self.snapshot.read().await;
        snapshot
            .templates
            .iter()
            .find(|t| t.id == id_or_code)
            .or_else(|| snapshot.templates.iter().find(|t| t.code == id_or_code))
            .cloned()
            .ok_or_else(|| RepositoryError::template(id_or_code))
    }

    async fn list_templates(&self, filter: &TemplateFilter) -> RepositoryResult<Vec<Template>> {
        Ok(self
            .snapshot
            .read()
            .await
            .templates
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }
}
