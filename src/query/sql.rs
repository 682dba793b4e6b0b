//! SQL lowering
//!
//! Clauses are emitted one per line in the fixed order `SELECT`, `FROM`,
//! `JOIN`s (declaration order), `WHERE`, `GROUP BY`, `HAVING`, `ORDER BY`,
//! `LIMIT`, `OFFSET`. Identifiers are double-quoted and every filter or
//! having value is bound as a positional `$n` parameter.

use serde_json::Value;

use super::{column_name, quote_ident, JoinStep, QueryPlan};
use crate::metamodel::{Entity, FilterOperator, JoinTableConfig, RelationshipType};
use crate::naming::to_snake_case;

/// Collects bound values and hands out their placeholders
#[derive(Debug, Default)]
struct Parameters {
    values: Vec<Value>,
}

impl Parameters {
    fn bind(&mut self, value: Value) -> String {
        self.values.push(value);
        format!("${}", self.values.len())
    }
}

/// Lowers the plan to SQL text and its parameters, in placeholder order
pub fn lower(plan: &QueryPlan<'_, '_>) -> (String, Vec<Value>) {
    let mut params = Parameters::default();
    let mut lines = Vec::new();

    lines.push(select_clause(plan));
    lines.push(format!(
        "FROM {} AS {}",
        quote_ident(&plan.base().table_name()),
        quote_ident(&plan.graph.base.alias)
    ));
    for step in &plan.graph.steps {
        lines.extend(join_clauses(step));
    }

    let conditions: Vec<(String, String)> = plan
        .spec
        .filters
        .iter()
        .filter_map(|filter| {
            let column = plan.column(&filter.entity_id, &filter.field_id)?;
            let fragment = condition(&column.qualified(), filter.operator, &filter.value, &mut params);
            Some((filter.logical_operator.to_string(), fragment))
        })
        .collect();
    if !conditions.is_empty() {
        let mut clause = String::from("WHERE ");
        for (i, (logical, fragment)) in conditions.iter().enumerate() {
            if i > 0 {
                clause.push_str(&format!(" {} ", logical));
            }
            clause.push_str(fragment);
        }
        lines.push(clause);
    }

    let group_by: Vec<String> = plan
        .spec
        .group_by
        .iter()
        .filter_map(|g| plan.column(&g.entity_id, &g.field_id))
        .map(|c| c.qualified())
        .collect();
    if !group_by.is_empty() {
        lines.push(format!("GROUP BY {}", group_by.join(", ")));
    }

    let having: Vec<String> = plan
        .spec
        .having
        .iter()
        .filter_map(|h| {
            let column = plan.column(&h.entity_id, &h.field_id)?;
            let expr = format!("{}({})", h.aggregation, column.qualified());
            Some(condition(&expr, h.operator, &h.value, &mut params))
        })
        .collect();
    if !having.is_empty() {
        lines.push(format!("HAVING {}", having.join(" AND ")));
    }

    let order_by: Vec<String> = plan
        .spec
        .sorting
        .iter()
        .filter_map(|s| {
            let column = plan.column(&s.entity_id, &s.field_id)?;
            Some(format!("{} {}", column.qualified(), s.direction))
        })
        .collect();
    if !order_by.is_empty() {
        lines.push(format!("ORDER BY {}", order_by.join(", ")));
    }

    let (limit, offset) = plan.spec.limit_offset();
    if let Some(limit) = limit {
        lines.push(format!("LIMIT {}", limit));
    }
    if let Some(offset) = offset {
        lines.push(format!("OFFSET {}", offset));
    }

    (lines.join("\n"), params.values)
}

fn select_clause(plan: &QueryPlan<'_, '_>) -> String {
    if plan.spec.select_fields.is_empty() {
        return format!("SELECT {}.*", quote_ident(&plan.graph.base.alias));
    }
    let columns: Vec<String> = plan
        .projections()
        .iter()
        .map(|p| {
            let expr = match p.aggregation {
                Some(aggregation) => format!("{}({})", aggregation, p.column.qualified()),
                None => p.column.qualified(),
            };
            format!("{} AS {}", expr, quote_ident(&p.alias))
        })
        .collect();
    format!("SELECT {}", columns.join(", "))
}

/// Column named by an optional field id, falling back to `default`
fn participating_column(entity: &Entity, field_id: Option<&String>, default: String) -> String {
    field_id
        .and_then(|id| entity.field(id).or_else(|| entity.field_by_code(id)))
        .map(column_name)
        .unwrap_or(default)
}

fn default_join_table(source: &Entity, target: &Entity) -> JoinTableConfig {
    JoinTableConfig {
        table_name: format!("{}_{}", to_snake_case(&source.code), to_snake_case(&target.code)),
        source_column: format!("{}_id", to_snake_case(&source.code)),
        target_column: format!("{}_id", to_snake_case(&target.code)),
    }
}

/// One `JOIN` line, or two for a many-to-many relationship
fn join_clauses(step: &JoinStep<'_>) -> Vec<String> {
    let relationship = step.relationship;
    let (source, target) = if step.forward {
        (&step.from, &step.to)
    } else {
        (&step.to, &step.from)
    };
    let keyword = step.join_type.sql();
    let table = quote_ident(&step.to.entity.table_name());
    let alias = quote_ident(&step.to.alias);

    if relationship.relationship_type == RelationshipType::ManyToMany {
        let link = relationship
            .join_table()
            .cloned()
            .unwrap_or_else(|| default_join_table(source.entity, target.entity));
        let source_pk =
            participating_column(source.entity, relationship.source_field_id.as_ref(), "id".into());
        let target_pk =
            participating_column(target.entity, relationship.target_field_id.as_ref(), "id".into());
        let (from_pk, from_link, to_link, to_pk) = if step.forward {
            (source_pk, &link.source_column, &link.target_column, target_pk)
        } else {
            (target_pk, &link.target_column, &link.source_column, source_pk)
        };
        let link_alias = quote_ident(&format!("{}_link", step.to.alias));
        return vec![
            format!(
                "{} {} AS {} ON {}.{} = {}.{}",
                keyword,
                quote_ident(&link.table_name),
                link_alias,
                quote_ident(&step.from.alias),
                quote_ident(&from_pk),
                link_alias,
                quote_ident(from_link)
            ),
            format!(
                "{} {} AS {} ON {}.{} = {}.{}",
                keyword,
                table,
                alias,
                link_alias,
                quote_ident(to_link),
                alias,
                quote_ident(&to_pk)
            ),
        ];
    }

    let fk_name = relationship.foreign_key_name.clone();
    let (source_column, target_column) = match relationship.relationship_type {
        RelationshipType::OneToMany => (
            participating_column(source.entity, relationship.source_field_id.as_ref(), "id".into()),
            participating_column(
                target.entity,
                relationship.target_field_id.as_ref(),
                fk_name.unwrap_or_else(|| format!("{}_id", to_snake_case(&source.entity.code))),
            ),
        ),
        _ => (
            participating_column(
                source.entity,
                relationship.source_field_id.as_ref(),
                fk_name.unwrap_or_else(|| format!("{}_id", to_snake_case(&target.entity.code))),
            ),
            participating_column(target.entity, relationship.target_field_id.as_ref(), "id".into()),
        ),
    };

    vec![format!(
        "{} {} AS {} ON {}.{} = {}.{}",
        keyword,
        table,
        alias,
        quote_ident(&source.alias),
        quote_ident(&source_column),
        quote_ident(&target.alias),
        quote_ident(&target_column)
    )]
}

/// SQL fragment for `expr <operator> value`, binding the value
fn condition(expr: &str, operator: FilterOperator, value: &Value, params: &mut Parameters) -> String {
    match operator {
        FilterOperator::Eq => format!("{} = {}", expr, params.bind(value.clone())),
        FilterOperator::Ne => format!("{} <> {}", expr, params.bind(value.clone())),
        FilterOperator::Gt => format!("{} > {}", expr, params.bind(value.clone())),
        FilterOperator::Gte => format!("{} >= {}", expr, params.bind(value.clone())),
        FilterOperator::Lt => format!("{} < {}", expr, params.bind(value.clone())),
        FilterOperator::Lte => format!("{} <= {}", expr, params.bind(value.clone())),
        FilterOperator::Like => {
            let needle = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
            format!("{} LIKE {}", expr, params.bind(Value::String(format!("%{}%", needle))))
        }
        FilterOperator::In => {
            let items = match value {
                Value::Array(items) => items.clone(),
                other => vec![other.clone()],
            };
            let placeholders: Vec<String> = items.into_iter().map(|v| params.bind(v)).collect();
            format!("{} IN ({})", expr, placeholders.join(", "))
        }
        FilterOperator::Between => {
            let (low, high) = match value.as_array().map(Vec::as_slice) {
                Some([low, high]) => (low.clone(), high.clone()),
                _ => (Value::Null, Value::Null),
            };
            format!("{} BETWEEN {} AND {}", expr, params.bind(low), params.bind(high))
        }
        FilterOperator::IsNull => format!("{} IS NULL", expr),
        FilterOperator::IsNotNull => format!("{} IS NOT NULL", expr),
    }
}
