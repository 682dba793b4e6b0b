//! Template context for one entity
//!
//! ```text
//! {
//!   entity:           id, name, code, table_name, description, category, version
//!   names:            original, pascal, camel, kebab, snake, plural_kebab
//!   fields:           every field by display order, annotated with column and type projections
//!   common_fields / business_fields / required_fields / unique_fields
//!   primary_key:      annotated field or null
//!   relationships:    name, code, type, direction, to_many, other { name, names }
//!   options:          generation options
//!   layout:           relative import fragments for the chosen architecture
//!   variables:        caller variables layered over template defaults
//!   generated_at:     RFC 3339 timestamp
//! }
//! ```

use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::common::HelperTable;
use crate::metamodel::{Entity, Field, ModelView, RelationshipType};
use crate::naming::NameSet;
use crate::options::{Architecture, GenerationOptions};
use crate::type_mapping::map_field;

/// Everything a template sees when rendering one entity
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub entity_code: String,
    pub data: Value,
    pub helpers: HelperTable,
    /// Non-fatal findings while annotating, such as unknown data types
    pub warnings: Vec<String>,
}

fn annotate_field(field: &Field, warnings: &mut Vec<String>) -> Value {
    let mapping = map_field(field);
    if mapping.fallback {
        warnings.push(format!(
            "Field '{}.{}' has unknown data type '{}', generated as {}",
            field.entity_id, field.code, field.data_type, mapping.storage
        ));
    }
    json!({
        "id": field.id,
        "name": field.name,
        "code": field.code,
        "names": NameSet::of(&field.code),
        "column": crate::query::column_name(field),
        "type": field.data_type.as_str(),
        "length": field.length,
        "precision": field.precision,
        "scale": field.scale,
        "required": field.required,
        "unique": field.unique,
        "default_value": field.default_value,
        "comment": field.comment,
        "display_order": field.display_order,
        "is_common": field.is_common,
        "sql_type": mapping.storage,
        "ts_type": mapping.host,
        "orm_type": mapping.orm,
        "form_widget": mapping.presentation.form_widget,
        "column_kind": mapping.presentation.column_kind,
        "fallback": mapping.fallback,
    })
}

/// Import path fragments matching the path table of the architecture
fn layout(architecture: Architecture) -> Value {
    match architecture {
        Architecture::Flat => json!({
            "base_root": "src",
            "base_infix": "",
            "module_to_base": "..",
        }),
        Architecture::Layered => json!({
            "base_root": "src/base",
            "base_infix": "base.",
            "module_to_base": "../../base",
        }),
    }
}

fn pick(annotated: &[(&Field, Value)], keep: impl Fn(&Field) -> bool) -> Vec<Value> {
    annotated
        .iter()
        .filter(|(f, _)| keep(f))
        .map(|(_, v)| v.clone())
        .collect()
}

fn relationship_entries(entity: &Entity, view: &ModelView<'_>) -> Vec<Value> {
    view.relationships_for(&entity.id)
        .filter_map(|rel| {
            let other_id = rel.other_end(&entity.id)?;
            let outgoing = rel.source_entity_id == entity.id;
            let to_many = match rel.relationship_type {
                RelationshipType::ManyToMany => true,
                RelationshipType::OneToOne => false,
                RelationshipType::OneToMany => outgoing,
                RelationshipType::ManyToOne => !outgoing,
            };
            let other = view.entity(other_id);
            let other_code = other.map(|e| e.code.as_str()).unwrap_or(other_id);
            Some(json!({
                "name": rel.name,
                "code": rel.code,
                "type": rel.relationship_type.to_string(),
                "direction": if outgoing { "outgoing" } else { "incoming" },
                "to_many": to_many,
                "on_delete": rel.on_delete.sql(),
                "on_update": rel.on_update.sql(),
                "other": {
                    "id": other_id,
                    "name": other.map(|e| e.name.as_str()).unwrap_or(other_id),
                    "names": NameSet::of(other_code),
                },
            }))
        })
        .collect()
}

impl RenderContext {
    /// Builds the context for `entity`; `view` supplies its relationships
    pub fn for_entity(
        entity: &Entity,
        view: &ModelView<'_>,
        options: &GenerationOptions,
        variables: &Map<String, Value>,
    ) -> RenderContext {
        let mut warnings = Vec::new();
        let sorted = entity.sorted_fields();
        let annotated: Vec<(&Field, Value)> = sorted
            .iter()
            .map(|f| (*f, annotate_field(f, &mut warnings)))
            .collect();
        let primary_key = entity
            .primary_key()
            .and_then(|pk| annotated.iter().find(|(f, _)| f.id == pk.id))
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Null);

        let data = json!({
            "entity": {
                "id": entity.id,
                "name": entity.name,
                "code": entity.code,
                "table_name": entity.table_name(),
                "description": entity.description,
                "category": entity.category,
                "version": entity.version,
                "status": entity.status.to_string(),
            },
            "names": NameSet::of(&entity.code),
            "fields": pick(&annotated, |_| true),
            "common_fields": pick(&annotated, |f| f.is_common),
            "business_fields": pick(&annotated, |f| !f.is_common),
            "required_fields": pick(&annotated, |f| f.required),
            "unique_fields": pick(&annotated, |f| f.unique),
            "primary_key": primary_key,
            "relationships": relationship_entries(entity, view),
            "options": options,
            "layout": layout(options.architecture),
            "variables": variables,
            "generated_at": Utc::now().to_rfc3339(),
        });

        RenderContext {
            entity_code: entity.code.clone(),
            data,
            helpers: HelperTable::new().strict(options.strict_templates),
            warnings,
        }
    }

    /// Caller variables as supplied, before template defaults
    pub fn variables(&self) -> Map<String, Value> {
        self.data
            .get("variables")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }
}
