use serde_json::json;

use super::{api_stub, sql, QueryPlan};
use crate::errors::TemplateResult;
use crate::render::render_builtin;

pub fn get_template() -> String {
    include_str!("join_docs.md.hbs").to_string()
}

/// Markdown reference for the generated endpoint
pub fn render(plan: &QueryPlan<'_, '_>) -> TemplateResult<String> {
    let relationships: Vec<_> = plan
        .graph
        .steps
        .iter()
        .map(|step| {
            json!({
                "name": step.relationship.name,
                "type": step.relationship.relationship_type.to_string(),
                "join": step.join_type.sql(),
                "from": step.from.entity.name,
                "to": step.to.entity.name,
            })
        })
        .collect();

    let fields: Vec<_> = plan
        .projections()
        .iter()
        .map(|p| {
            json!({
                "alias": p.alias,
                "label": p.column.field.name,
                "source": format!("{}.{}", p.column.entity.name, p.column.field.code),
                "aggregation": p.aggregation.map(|a| a.to_string()),
            })
        })
        .collect();

    let filters: Vec<String> = plan
        .spec
        .filters
        .iter()
        .filter_map(|f| {
            let column = plan.column(&f.entity_id, &f.field_id)?;
            Some(format!("`{}` {}", column.flat_name(), f.operator))
        })
        .collect();

    let (sql_text, _) = sql::lower(plan);
    let size = plan.spec.pagination.map(|p| p.size).or(plan.spec.limit).unwrap_or(10);

    render_builtin(
        "join-docs",
        &plan.base().code,
        &get_template(),
        &json!({
            "title": plan
                .spec
                .name
                .clone()
                .unwrap_or_else(|| format!("{} join query", plan.base().name)),
            "description": plan.spec.description,
            "base": { "name": plan.base().name, "table": plan.base().table_name() },
            "relationships": relationships,
            "fields": fields,
            "filters": filters,
            "route": api_stub::route(plan),
            "prefix": plan.type_prefix(),
            "size": size,
            "sql": sql_text,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::super::synthesize;
    use crate::metamodel::ModelView;
    use crate::options::GenerationOptions;

    #[test]
    fn test_documents_relationships_fields_and_usage() {
        let (entities, relationships) = shop();
        let view = ModelView::new(&entities, &relationships);
        let docs = synthesize(&big_orders(), &view, &GenerationOptions::default())
            .expect("valid")
            .documentation;

        assert!(docs.starts_with("# User join query\n"));
        assert!(docs.contains("- User orders (ONE_TO_MANY, INNER JOIN): User -> Order\n"));
        assert!(docs.contains("- `user_email`: email (User.email)\n"));
        assert!(docs.contains("- `order_total` gt\n"));
        assert!(docs.contains("GET /api/v1/user-join?page=1&size=10"));
        assert!(docs.contains("Each item is a `UserJoinResult`."));
    }
}
