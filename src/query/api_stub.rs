use indexmap::IndexMap;
use serde_json::json;

use super::QueryPlan;
use crate::errors::TemplateResult;
use crate::metamodel::FilterOperator;
use crate::naming::{to_camel_case, to_kebab_case};
use crate::render::render_builtin;

const DEFAULT_PAGE_SIZE: u64 = 10;

pub fn get_template() -> String {
    include_str!("join_controller.ts.hbs").to_string()
}

/// Route of the generated controller, `api/v1/<kebab>-join`
pub fn route(plan: &QueryPlan<'_, '_>) -> String {
    format!("api/v1/{}-join", to_kebab_case(&plan.base().code))
}

/// NestJS controller stub taking one query parameter per filtered field plus paging
pub fn render(plan: &QueryPlan<'_, '_>) -> TemplateResult<String> {
    let mut params: IndexMap<String, serde_json::Value> = IndexMap::new();
    for filter in &plan.spec.filters {
        if filter.operator.is_unary() {
            continue;
        }
        let Some(column) = plan.column(&filter.entity_id, &filter.field_id) else {
            continue;
        };
        // list-valued operators arrive as a comma separated string
        let ts_type = match filter.operator {
            FilterOperator::In | FilterOperator::Between => "string",
            _ => crate::type_mapping::host_type(&column.field.data_type),
        };
        let name = column.flat_name();
        params.entry(name.clone()).or_insert_with(|| {
            json!({
                "name": name,
                "type": ts_type,
                "description": format!("{}.{}", column.entity.name, column.field.name),
            })
        });
    }

    let prefix = plan.type_prefix();
    let service = format!("{}Service", prefix);
    let default_size = plan
        .spec
        .pagination
        .map(|p| p.size)
        .or(plan.spec.limit)
        .unwrap_or(DEFAULT_PAGE_SIZE);

    render_builtin(
        "join-controller",
        &plan.base().code,
        &get_template(),
        &json!({
            "base": { "name": plan.base().name },
            "summary": plan.spec.description,
            "prefix": prefix,
            "kebab": to_kebab_case(&plan.base().code),
            "route": route(plan),
            "service_field": to_camel_case(&service),
            "service": service,
            "params": params.values().collect::<Vec<_>>(),
            "default_size": default_size,
        }),
    )
}
