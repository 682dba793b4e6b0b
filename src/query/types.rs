use serde_json::json;

use super::QueryPlan;
use crate::errors::TemplateResult;
use crate::render::render_builtin;

pub fn get_template() -> String {
    include_str!("join_result.ts.hbs").to_string()
}

/// TypeScript declarations for one result row and the paged list response
pub fn render(plan: &QueryPlan<'_, '_>) -> TemplateResult<String> {
    let members: Vec<_> = plan
        .projections()
        .iter()
        .map(|p| json!({ "name": p.alias, "type": p.host_type() }))
        .collect();

    render_builtin(
        "join-result",
        &plan.base().code,
        &get_template(),
        &json!({
            "name": plan.spec.name,
            "base": { "name": plan.base().name },
            "prefix": plan.type_prefix(),
            "members": members,
        }),
    )
}
