use std::collections::HashMap;
use tracing::{debug, warn};

use super::{Rule, ValidationResult};
use crate::metamodel::{Aggregation, JoinQuerySpec, ModelView};
use crate::naming::is_identifier;
use crate::options::EmptyProjectionPolicy;
use crate::query::graph::JoinGraph;
use crate::query::{output_name, resolve_column};

/// Validates a join query specification against the model
pub fn validate_join_query(
    spec: &JoinQuerySpec,
    view: &ModelView<'_>,
    policy: EmptyProjectionPolicy,
) -> ValidationResult {
    check_join_query(spec, view, policy).0
}

/// Validates and, when the base entity resolves, also returns the join graph
pub fn check_join_query<'a>(
    spec: &JoinQuerySpec,
    view: &ModelView<'a>,
    policy: EmptyProjectionPolicy,
) -> (ValidationResult, Option<JoinGraph<'a>>) {
    let mut result = ValidationResult::new();

    check_required(&mut result, spec);
    check_aliases(&mut result, spec);
    check_pagination(&mut result, spec);

    let (graph, violations) = JoinGraph::build(spec, view);
    result.extend(violations);

    check_output_names(&mut result, spec, graph.as_ref(), view);
    check_operands(&mut result, spec, view);
    check_projection(&mut result, spec, policy);

    if result.valid {
        debug!(
            "Join query on '{}' with {} join(s) validated : ok",
            spec.base_entity_id,
            spec.joins.len()
        );
    } else {
        warn!("Identified {} join query error(s)", result.errors.len());
    }
    (result, graph)
}

fn check_required(result: &mut ValidationResult, spec: &JoinQuerySpec) {
    if spec.base_entity_id.trim().is_empty() {
        result.error("base_entity_id", Rule::Required, "base entity is required");
    }
    for (i, join) in spec.joins.iter().enumerate() {
        if join.relationship_id.trim().is_empty() {
            result.error(
                format!("joins[{}].relationship_id", i),
                Rule::Required,
                "relationship is required",
            );
        }
    }
    for (path, field_ref) in spec.field_refs() {
        if field_ref.entity_id.trim().is_empty() {
            result.error(format!("{}.entity_id", path), Rule::Required, "entity is required");
        }
        if field_ref.field_id.trim().is_empty() {
            result.error(format!("{}.field_id", path), Rule::Required, "field is required");
        }
    }
}

fn check_aliases(result: &mut ValidationResult, spec: &JoinQuerySpec) {
    let mut check = |path: String, alias: &Option<String>| {
        if let Some(alias) = alias {
            if !is_identifier(alias) {
                result.error(
                    path,
                    Rule::IdentifierFormat,
                    format!("alias '{}' is not a valid identifier", alias),
                );
            }
        }
    };
    check("base_alias".to_string(), &spec.base_alias);
    for (i, join) in spec.joins.iter().enumerate() {
        check(format!("joins[{}].alias", i), &join.alias);
    }
    for (i, select) in spec.select_fields.iter().enumerate() {
        check(format!("select_fields[{}].alias", i), &select.alias);
    }
}

fn check_pagination(result: &mut ValidationResult, spec: &JoinQuerySpec) {
    if let Some(pagination) = spec.pagination {
        if pagination.page == 0 {
            result.error("pagination.page", Rule::Range, "page starts at 1");
        }
        if pagination.size == 0 {
            result.error("pagination.size", Rule::Range, "page size must be positive");
        }
        if pagination.offset().is_none() {
            result.error(
                "pagination.page",
                Rule::Range,
                format!(
                    "page {} of size {} is past the largest representable offset",
                    pagination.page, pagination.size
                ),
            );
        }
    }
}

/// Every select must produce a distinct column in the result row, whether
/// its name was given or derived
fn check_output_names<'a>(
    result: &mut ValidationResult,
    spec: &JoinQuerySpec,
    graph: Option<&JoinGraph<'a>>,
    view: &ModelView<'a>,
) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for (i, select) in spec.select_fields.iter().enumerate() {
        let resolved = graph.and_then(|g| resolve_column(g, view, &select.entity_id, &select.field_id));
        let name = match (&select.alias, resolved) {
            (Some(alias), _) => alias.clone(),
            (None, Some(column)) => output_name(select, &column),
            (None, None) => continue,
        };
        match seen.get(&name) {
            Some(first) => result.error(
                format!("select_fields[{}].alias", i),
                Rule::Duplicate,
                format!(
                    "output column '{}' is already produced by select_fields[{}]",
                    name, first
                ),
            ),
            None => {
                seen.insert(name, i);
            }
        }
    }
}

fn check_operands(result: &mut ValidationResult, spec: &JoinQuerySpec, view: &ModelView<'_>) {
    for (i, filter) in spec.filters.iter().enumerate() {
        if !filter.operator.accepts(&filter.value) {
            result.error(
                format!("filters[{}].value", i),
                Rule::InvalidOperand,
                format!("value {} does not fit operator '{}'", filter.value, filter.operator),
            );
        }
    }
    for (i, having) in spec.having.iter().enumerate() {
        if !having.operator.accepts(&having.value) {
            result.error(
                format!("having[{}].value", i),
                Rule::InvalidOperand,
                format!("value {} does not fit operator '{}'", having.value, having.operator),
            );
        }
    }

    let aggregated = spec
        .select_fields
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.aggregation.map(|a| (format!("select_fields[{}]", i), a, s)));
    for (path, aggregation, select) in aggregated {
        if !matches!(aggregation, Aggregation::Sum | Aggregation::Avg) {
            continue;
        }
        if let Some(field) = view.field(&select.entity_id, &select.field_id) {
            if !field.data_type.is_numeric() {
                result.error(
                    format!("{}.aggregation", path),
                    Rule::InvalidOperand,
                    format!(
                        "{} needs a numeric field, '{}' is {}",
                        aggregation, field.code, field.data_type
                    ),
                );
            }
        }
    }

    let has_aggregate = spec.select_fields.iter().any(|s| s.aggregation.is_some());
    let has_plain = spec.select_fields.iter().any(|s| s.aggregation.is_none());
    if has_aggregate && has_plain && spec.group_by.is_empty() {
        result.warn("query mixes aggregated and plain columns without group_by");
    }
}

fn check_projection(result: &mut ValidationResult, spec: &JoinQuerySpec, policy: EmptyProjectionPolicy) {
    if !spec.select_fields.is_empty() {
        return;
    }
    match policy {
        EmptyProjectionPolicy::Warn => {
            result.warn("no select fields given, selecting every column of the base entity")
        }
        EmptyProjectionPolicy::Reject => result.error(
            "select_fields",
            Rule::EmptyProjection,
            "at least one select field is required",
        ),
    }
}
