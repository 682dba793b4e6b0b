use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use super::{Rule, ValidationResult};
use crate::metamodel::{Entity, ModelView, Relationship};
use crate::naming::is_identifier;

fn entity_path(entity: &Entity) -> String {
    format!("entities.{}", entity.id)
}

fn field_path(entity: &Entity, field_id: &str) -> String {
    format!("entities.{}.fields.{}", entity.id, field_id)
}

fn relationship_path(relationship: &Relationship) -> String {
    format!("relationships.{}", relationship.id)
}

fn require(result: &mut ValidationResult, path: String, attribute: &str, value: &str) {
    if value.trim().is_empty() {
        result.error(
            format!("{}.{}", path, attribute),
            Rule::Required,
            format!("{} is required", attribute),
        );
    }
}

fn check_identifier(result: &mut ValidationResult, path: String, value: &str) {
    if !value.trim().is_empty() && !is_identifier(value) {
        result.error(
            format!("{}.code", path),
            Rule::IdentifierFormat,
            format!(
                "'{}' must start with a letter and contain only letters, digits and underscores",
                value
            ),
        );
    }
}

/// Validates every entity and relationship in the view
pub fn validate_model(view: &ModelView<'_>) -> ValidationResult {
    let entities: Vec<&Entity> = view.entities().iter().collect();
    let relationships: Vec<&Relationship> = view.relationships().iter().collect();
    run_checks(view, &entities, &relationships)
}

/// Validates the listed entities and every relationship touching them.
///
/// Entities outside the list are only used to resolve references.
pub fn validate_entities(view: &ModelView<'_>, entity_ids: &[String]) -> ValidationResult {
    let mut result = ValidationResult::new();
    let mut entities = Vec::new();
    for id in entity_ids {
        match view.entity(id) {
            Some(entity) => entities.push(entity),
            None => result.error(
                format!("entities.{}", id),
                Rule::UnknownReference,
                format!("entity '{}' does not exist", id),
            ),
        }
    }
    let wanted: HashSet<&str> = entities.iter().map(|e| e.id.as_str()).collect();
    let relationships: Vec<&Relationship> = view
        .relationships()
        .iter()
        .filter(|r| {
            wanted.contains(r.source_entity_id.as_str())
                || wanted.contains(r.target_entity_id.as_str())
        })
        .collect();
    result.merge(run_checks(view, &entities, &relationships));
    result
}

fn run_checks(
    view: &ModelView<'_>,
    entities: &[&Entity],
    relationships: &[&Relationship],
) -> ValidationResult {
    let mut result = ValidationResult::new();

    check_required(&mut result, entities, relationships);
    check_identifiers(&mut result, entities, relationships);
    check_ranges(&mut result, entities);
    check_references(&mut result, view, relationships);
    check_uniqueness(&mut result, entities, relationships);

    if result.valid {
        debug!(
            "Validated {} entities and {} relationships : ok",
            entities.len(),
            relationships.len()
        );
    } else {
        warn!("Identified {} specification error(s)", result.errors.len());
    }
    result
}

fn check_required(result: &mut ValidationResult, entities: &[&Entity], relationships: &[&Relationship]) {
    for entity in entities {
        let path = entity_path(entity);
        require(result, path.clone(), "id", &entity.id);
        require(result, path.clone(), "project_id", &entity.project_id);
        require(result, path.clone(), "name", &entity.name);
        require(result, path, "code", &entity.code);

        for field in &entity.fields {
            let path = field_path(entity, &field.id);
            require(result, path.clone(), "id", &field.id);
            require(result, path.clone(), "name", &field.name);
            require(result, path, "code", &field.code);
            if !field.data_type.is_known() {
                result.warn(format!(
                    "{}: unknown data type '{}' will be mapped to a text column",
                    field_path(entity, &field.id),
                    field.data_type
                ));
            }
        }
    }

    for relationship in relationships {
        let path = relationship_path(relationship);
        require(result, path.clone(), "id", &relationship.id);
        require(result, path.clone(), "project_id", &relationship.project_id);
        require(result, path.clone(), "name", &relationship.name);
        require(result, path.clone(), "code", &relationship.code);
        require(result, path.clone(), "source_entity_id", &relationship.source_entity_id);
        require(result, path, "target_entity_id", &relationship.target_entity_id);
    }
}

fn check_identifiers(
    result: &mut ValidationResult,
    entities: &[&Entity],
    relationships: &[&Relationship],
) {
    for entity in entities {
        check_identifier(result, entity_path(entity), &entity.code);
        for field in &entity.fields {
            check_identifier(result, field_path(entity, &field.id), &field.code);
        }
    }
    for relationship in relationships {
        check_identifier(result, relationship_path(relationship), &relationship.code);
    }
}

fn check_ranges(result: &mut ValidationResult, entities: &[&Entity]) {
    for entity in entities {
        for field in &entity.fields {
            let path = field_path(entity, &field.id);
            if let Some(length) = field.length {
                if length <= 0 {
                    result.error(
                        format!("{}.length", path),
                        Rule::Range,
                        format!("length must be positive, got {}", length),
                    );
                }
            }
            if let Some(precision) = field.precision {
                if precision < 0 {
                    result.error(
                        format!("{}.precision", path),
                        Rule::Range,
                        format!("precision must not be negative, got {}", precision),
                    );
                }
            }
            if field.display_order < 0 {
                result.error(
                    format!("{}.display_order", path),
                    Rule::Range,
                    format!("display order must not be negative, got {}", field.display_order),
                );
            }
        }
    }
}

fn check_references(
    result: &mut ValidationResult,
    view: &ModelView<'_>,
    relationships: &[&Relationship],
) {
    for relationship in relationships {
        let path = relationship_path(relationship);
        let ends = [
            ("source", &relationship.source_entity_id, &relationship.source_field_id),
            ("target", &relationship.target_entity_id, &relationship.target_field_id),
        ];
        for (end, entity_id, field_id) in ends {
            if entity_id.trim().is_empty() {
                continue;
            }
            let Some(entity) = view.entity(entity_id) else {
                result.error(
                    format!("{}.{}_entity_id", path, end),
                    Rule::UnknownReference,
                    format!("{} entity '{}' does not exist", end, entity_id),
                );
                continue;
            };
            if !relationship.project_id.is_empty() && entity.project_id != relationship.project_id {
                result.error(
                    format!("{}.{}_entity_id", path, end),
                    Rule::CrossProject,
                    format!(
                        "{} entity '{}' belongs to project '{}', not '{}'",
                        end, entity_id, entity.project_id, relationship.project_id
                    ),
                );
            }
            if let Some(field_id) = field_id {
                if view.field(entity_id, field_id).is_none() {
                    result.error(
                        format!("{}.{}_field_id", path, end),
                        Rule::UnknownReference,
                        format!("field '{}' does not exist on entity '{}'", field_id, entity_id),
                    );
                }
            }
        }
    }
}

fn check_uniqueness(
    result: &mut ValidationResult,
    entities: &[&Entity],
    relationships: &[&Relationship],
) {
    let mut entity_codes: HashMap<(&str, &str), &str> = HashMap::new();
    for entity in entities {
        if entity.code.is_empty() {
            continue;
        }
        if let Some(other) = entity_codes.insert((&entity.project_id, &entity.code), &entity.id) {
            result.error(
                format!("{}.code", entity_path(entity)),
                Rule::Duplicate,
                format!("entity code '{}' is already used by '{}'", entity.code, other),
            );
        }
    }

    for entity in entities {
        let mut codes: HashMap<&str, &str> = HashMap::new();
        let mut orders: HashMap<i64, &str> = HashMap::new();
        for field in &entity.fields {
            let path = field_path(entity, &field.id);
            if !field.code.is_empty() {
                if let Some(other) = codes.insert(&field.code, &field.id) {
                    result.error(
                        format!("{}.code", path),
                        Rule::Duplicate,
                        format!("field code '{}' is already used by '{}'", field.code, other),
                    );
                }
            }
            if let Some(other) = orders.insert(field.display_order, &field.id) {
                result.error(
                    format!("{}.display_order", path),
                    Rule::Duplicate,
                    format!(
                        "display order {} is already used by '{}'",
                        field.display_order, other
                    ),
                );
            }
            if field.shadows_common_field() {
                result.error(
                    format!("{}.code", path),
                    Rule::ReservedName,
                    format!("field code '{}' conflicts with system common field", field.code),
                );
            }
        }
    }

    let mut relationship_codes: HashMap<(&str, &str), &str> = HashMap::new();
    for relationship in relationships {
        if relationship.code.is_empty() {
            continue;
        }
        if let Some(other) = relationship_codes.insert(
            (&relationship.project_id, &relationship.code),
            &relationship.id,
        ) {
            result.error(
                format!("{}.code", relationship_path(relationship)),
                Rule::Duplicate,
                format!(
                    "relationship code '{}' is already used by '{}'",
                    relationship.code, other
                ),
            );
        }
    }
}
