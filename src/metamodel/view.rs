use std::collections::HashMap;

use super::{Entity, Field, Relationship};

/// Read-only index over a set of entities and relationships
///
/// Lookups accept ids; fields can also be found by code so hand-written
/// plans can say `email` instead of `User-email`.
pub struct ModelView<'a> {
    entities: &'a [Entity],
    relationships: &'a [Relationship],
    entity_index: HashMap<&'a str, &'a Entity>,
    relationship_index: HashMap<&'a str, &'a Relationship>,
}

impl<'a> ModelView<'a> {
    pub fn new(entities: &'a [Entity], relationships: &'a [Relationship]) -> Self {
        let mut entity_index = HashMap::new();
        for entity in entities {
            entity_index.entry(entity.id.as_str()).or_insert(entity);
        }
        let mut relationship_index = HashMap::new();
        for relationship in relationships {
            relationship_index
                .entry(relationship.id.as_str())
                .or_insert(relationship);
        }
        ModelView {
            entities,
            relationships,
            entity_index,
            relationship_index,
        }
    }

    pub fn entities(&self) -> &'a [Entity] {
        self.entities
    }

    pub fn relationships(&self) -> &'a [Relationship] {
        self.relationships
    }

    pub fn entity(&self, id: &str) -> Option<&'a Entity> {
        self.entity_index.get(id).copied()
    }

    pub fn relationship(&self, id: &str) -> Option<&'a Relationship> {
        self.relationship_index.get(id).copied()
    }

    pub fn field(&self, entity_id: &str, field_id: &str) -> Option<&'a Field> {
        let entity = self.entity(entity_id)?;
        entity
            .field(field_id)
            .or_else(|| entity.field_by_code(field_id))
    }

    pub fn relationships_for(&self, entity_id: &str) -> impl Iterator<Item = &'a Relationship> + '_ {
        let entity_id = entity_id.to_string();
        self.relationships
            .iter()
            .filter(move |r| r.involves(&entity_id))
    }
}
