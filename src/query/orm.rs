//! Prisma-shaped query object
//!
//! Produces the argument object of a `findMany` call on the base model:
//! `include` mirrors the join tree, `where` and `orderBy` mirror filters and
//! sorting (nested through relation fields for joined entities), `skip` and
//! `take` mirror limit and offset. Relation fields are named after the entity
//! on the other end, camelCase, pluralised on the to-many side.

use serde_json::{json, Map, Value};
use std::collections::HashMap;

use super::{JoinStep, QueryPlan};
use crate::metamodel::{FilterOperator, FilterSpec, LogicalOperator, RelationshipType};
use crate::naming::{pluralize, to_camel_case};

/// One hop from a node in the join tree to its child
#[derive(Debug, Clone)]
struct Hop {
    relation: String,
    to_many: bool,
}

/// Whether the `to` end of a step holds many rows per `from` row
pub fn is_to_many(step: &JoinStep<'_>) -> bool {
    match step.relationship.relationship_type {
        RelationshipType::ManyToMany => true,
        RelationshipType::OneToOne => false,
        RelationshipType::OneToMany => step.forward,
        RelationshipType::ManyToOne => !step.forward,
    }
}

/// Relation field name on the `from` model
pub fn relation_name(step: &JoinStep<'_>) -> String {
    let name = to_camel_case(&step.to.entity.code);
    if is_to_many(step) {
        pluralize(&name)
    } else {
        name
    }
}

/// Path of relation hops from the base entity to every joined entity
fn paths(plan: &QueryPlan<'_, '_>) -> HashMap<String, Vec<Hop>> {
    let mut paths: HashMap<String, Vec<Hop>> = HashMap::new();
    paths.insert(plan.base().id.clone(), Vec::new());
    for step in &plan.graph.steps {
        let mut path = paths.get(&step.from.entity.id).cloned().unwrap_or_default();
        path.push(Hop {
            relation: relation_name(step),
            to_many: is_to_many(step),
        });
        paths.insert(step.to.entity.id.clone(), path);
    }
    paths
}

/// Wraps `inner` in the relation filters leading to it
fn nest_filter(path: &[Hop], inner: Value) -> Value {
    path.iter().rev().fold(inner, |acc, hop| {
        let quantifier = if hop.to_many { "some" } else { "is" };
        json!({ hop.relation.clone(): { quantifier: acc } })
    })
}

fn field_condition(operator: FilterOperator, value: &Value) -> Value {
    match operator {
        FilterOperator::Eq => value.clone(),
        FilterOperator::Ne => json!({ "not": value }),
        FilterOperator::Gt => json!({ "gt": value }),
        FilterOperator::Gte => json!({ "gte": value }),
        FilterOperator::Lt => json!({ "lt": value }),
        FilterOperator::Lte => json!({ "lte": value }),
        FilterOperator::Like => json!({ "contains": value, "mode": "insensitive" }),
        FilterOperator::In => match value {
            Value::Array(_) => json!({ "in": value }),
            other => json!({ "in": [other] }),
        },
        FilterOperator::Between => match value.as_array().map(Vec::as_slice) {
            Some([low, high]) => json!({ "gte": low, "lte": high }),
            _ => Value::Null,
        },
        FilterOperator::IsNull => Value::Null,
        FilterOperator::IsNotNull => json!({ "not": null }),
    }
}

fn filter_object(plan: &QueryPlan<'_, '_>, paths: &HashMap<String, Vec<Hop>>, filter: &FilterSpec) -> Option<Value> {
    let column = plan.column(&filter.entity_id, &filter.field_id)?;
    let path = paths.get(&filter.entity_id)?;
    let inner = json!({ column.field.code.clone(): field_condition(filter.operator, &filter.value) });
    Some(nest_filter(path, inner))
}

fn combine(mut conditions: Vec<Value>, key: &str) -> Value {
    if conditions.len() == 1 {
        conditions.remove(0)
    } else {
        json!({ key: conditions })
    }
}

/// Filters grouped by `OR`, each group an `AND`, matching SQL precedence
fn where_clause(plan: &QueryPlan<'_, '_>, paths: &HashMap<String, Vec<Hop>>) -> Option<Value> {
    let mut groups: Vec<Vec<Value>> = Vec::new();
    for (i, filter) in plan.spec.filters.iter().enumerate() {
        let Some(condition) = filter_object(plan, paths, filter) else {
            continue;
        };
        match groups.last_mut() {
            Some(group) if i == 0 || filter.logical_operator == LogicalOperator::And => {
                group.push(condition)
            }
            _ => groups.push(vec![condition]),
        }
    }
    if groups.is_empty() {
        return None;
    }
    let groups: Vec<Value> = groups.into_iter().map(|g| combine(g, "AND")).collect();
    Some(combine(groups, "OR"))
}

fn order_by(plan: &QueryPlan<'_, '_>, paths: &HashMap<String, Vec<Hop>>, warnings: &mut Vec<String>) -> Vec<Value> {
    let mut order = Vec::new();
    for sort in &plan.spec.sorting {
        let (Some(column), Some(path)) = (plan.column(&sort.entity_id, &sort.field_id), paths.get(&sort.entity_id)) else {
            continue;
        };
        if path.iter().any(|hop| hop.to_many) {
            warnings.push(format!(
                "ORM query cannot order by '{}.{}' across a to-many relation, sort omitted",
                column.entity.code, column.field.code
            ));
            continue;
        }
        let direction = sort.direction.to_string().to_lowercase();
        let inner = json!({ column.field.code.clone(): direction });
        order.push(
            path.iter()
                .rev()
                .fold(inner, |acc, hop| json!({ hop.relation.clone(): acc })),
        );
    }
    order
}

/// `select` object for one joined entity, including its own joined children
fn select_for(plan: &QueryPlan<'_, '_>, step_index: usize) -> Value {
    let step = &plan.graph.steps[step_index];
    let mut select = Map::new();
    for projection in plan.projections() {
        if projection.column.entity.id == step.to.entity.id {
            select.insert(projection.column.field.code.clone(), Value::Bool(true));
        }
    }
    if select.is_empty() {
        let key = step
            .to
            .entity
            .primary_key()
            .map(|f| f.code.clone())
            .unwrap_or_else(|| "id".to_string());
        select.insert(key, Value::Bool(true));
    }
    for (child_index, child) in plan.graph.steps.iter().enumerate() {
        if child.from.entity.id == step.to.entity.id {
            select.insert(relation_name(child), select_for(plan, child_index));
        }
    }
    json!({ "select": select })
}

/// Lowers the plan to Prisma `findMany` arguments, recording what it cannot express
pub fn lower(plan: &QueryPlan<'_, '_>, warnings: &mut Vec<String>) -> Value {
    let paths = paths(plan);
    let mut query = Map::new();

    if let Some(where_clause) = where_clause(plan, &paths) {
        query.insert("where".to_string(), where_clause);
    }

    let mut include = Map::new();
    for (index, step) in plan.graph.steps.iter().enumerate() {
        if step.from.entity.id == plan.base().id {
            include.insert(relation_name(step), select_for(plan, index));
        }
    }
    if !include.is_empty() {
        query.insert("include".to_string(), Value::Object(include));
    }

    let order = order_by(plan, &paths, warnings);
    if !order.is_empty() {
        query.insert("orderBy".to_string(), Value::Array(order));
    }

    let (limit, offset) = plan.spec.limit_offset();
    if let Some(offset) = offset {
        query.insert("skip".to_string(), json!(offset));
    }
    if let Some(limit) = limit {
        query.insert("take".to_string(), json!(limit));
    }

    if !plan.spec.group_by.is_empty()
        || !plan.spec.having.is_empty()
        || plan.spec.select_fields.iter().any(|s| s.aggregation.is_some())
    {
        warnings.push("ORM query does not express aggregation, use the SQL artifact".to_string());
    }

    Value::Object(query)
}
