//! Template rendering
//!
//! Rendering is pure and synchronous: one template and one entity context in,
//! one string or one [`TemplateError`] out. Each call builds its own registry
//! from the context's [`HelperTable`], so renders can run on any thread.

pub mod builtin;
pub mod context;

use serde_json::Value;
use tracing::debug;

use crate::common::get_handlebars;
use crate::errors::{TemplateError, TemplateResult};
use crate::metamodel::Template;

pub use builtin::{builtin_template, BUILTIN_CODES};
pub use context::RenderContext;

/// Renders `template` against one entity context
pub fn render(template: &Template, context: &RenderContext) -> TemplateResult<String> {
    let supplied = context.variables();
    let missing = template.missing_required_variables(&supplied);
    if !missing.is_empty() {
        return Err(TemplateError::MissingVariables {
            template: template.code.clone(),
            names: missing,
        });
    }

    let mut data = context.data.clone();
    if let Value::Object(map) = &mut data {
        map.insert(
            "variables".to_string(),
            Value::Object(template.resolve_variables(&supplied)),
        );
        map.insert(
            "template".to_string(),
            serde_json::json!({
                "code": template.code,
                "name": template.name,
                "version": template.version.to_string(),
                "language": template.language,
            }),
        );
    }

    let mut handlebars = context.helpers.build();
    handlebars
        .register_template_string(&template.code, &template.content)
        .map_err(|e| TemplateError::Syntax {
            template: template.code.clone(),
            message: e.to_string(),
        })?;

    let rendered = handlebars
        .render(&template.code, &data)
        .map_err(|e| TemplateError::Render {
            template: template.code.clone(),
            entity: context.entity_code.clone(),
            message: e.to_string(),
        })?;

    debug!(
        "Rendered template '{}' for entity '{}' ({} bytes)",
        template.code,
        context.entity_code,
        rendered.len()
    );
    Ok(rendered)
}

/// Renders one of the crate's own templates against an ad hoc context
pub fn render_builtin(
    template_code: &str,
    entity_code: &str,
    content: &str,
    data: &Value,
) -> TemplateResult<String> {
    get_handlebars()
        .render_template(content, data)
        .map_err(|e| TemplateError::Render {
            template: template_code.to_string(),
            entity: entity_code.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metamodel::{Entity, Field, FieldDataType, ModelView, TemplateVariable, VariableKind};
    use crate::options::{Architecture, GenerationOptions};
    use serde_json::{json, Map};

    fn user() -> Entity {
        let mut user = Entity::new("p1", "User", "User").expect("entity");
        user.ensure_common_fields();
        user.add_field(
            Field::new("User", "email", FieldDataType::String, 6)
                .expect("field")
                .required(),
        );
        user
    }

    fn context_for(entity: &Entity, options: &GenerationOptions, variables: Map<String, Value>) -> RenderContext {
        let entities = vec![entity.clone()];
        let view = ModelView::new(&entities, &[]);
        RenderContext::for_entity(entity, &view, options, &variables)
    }

    #[test]
    fn test_render_custom_template() {
        let template = Template::new(
            "p1",
            "Fields",
            "fields",
            "typescript",
            "{{names.pascal}}:{{#each business_fields as |f|}} {{f.code}}={{sqlType f.type}}{{/each}}",
        )
        .expect("template");
        let ctx = context_for(&user(), &GenerationOptions::default(), Map::new());
        assert_eq!(render(&template, &ctx).expect("renders"), "User: email=VARCHAR(255)");
    }

    #[test]
    fn test_every_builtin_renders_in_both_architectures() {
        let entity = user();
        for architecture in [Architecture::Flat, Architecture::Layered] {
            let options = GenerationOptions {
                architecture,
                strict_templates: true,
                ..Default::default()
            };
            let ctx = context_for(&entity, &options, Map::new());
            for code in BUILTIN_CODES {
                let template = builtin_template(code).expect("builtin");
                let out = render(&template, &ctx)
                    .unwrap_or_else(|e| panic!("{} failed to render: {}", code, e));
                assert!(out.contains("User"), "{} does not mention the entity", code);
            }
        }
    }

    #[test]
    fn test_builtin_controller_content() {
        let options = GenerationOptions {
            architecture: Architecture::Layered,
            ..Default::default()
        };
        let ctx = context_for(&user(), &options, Map::new());
        let out = render(&builtin_template("controller").expect("builtin"), &ctx).expect("renders");
        assert!(out.contains("export class UserController {"));
        assert!(out.contains("@Controller('api/v1/users')"));
        assert!(out.contains("from '../services/user.base.service';"));
    }

    #[test]
    fn test_syntax_error_is_scoped_to_template() {
        let mut template = Template::new("p1", "Broken", "broken", "typescript", "ok").expect("template");
        template.content = "{{#each fields}}never closed".to_string();
        let ctx = context_for(&user(), &GenerationOptions::default(), Map::new());
        let err = render(&template, &ctx).expect_err("syntax error");
        assert!(matches!(err, TemplateError::Syntax { ref template, .. } if template == "broken"));
    }

    #[test]
    fn test_strict_mode_reports_missing_keys_per_entity() {
        let template = Template::new("p1", "Strict", "strict", "typescript", "{{nope}}").expect("template");
        let options = GenerationOptions {
            strict_templates: true,
            ..Default::default()
        };
        let ctx = context_for(&user(), &options, Map::new());
        let err = render(&template, &ctx).expect_err("missing key");
        assert!(matches!(err, TemplateError::Render { ref entity, .. } if entity == "User"));

        let lenient = context_for(&user(), &GenerationOptions::default(), Map::new());
        assert_eq!(render(&template, &lenient).expect("renders"), "");
    }

    #[test]
    fn test_required_variables() {
        let mut template =
            Template::new("p1", "Header", "header", "typescript", "// {{variables.author}} {{variables.year}}")
                .expect("template");
        template
            .set_variables(vec![
                TemplateVariable {
                    name: "author".into(),
                    kind: VariableKind::String,
                    description: None,
                    required: true,
                    default_value: None,
                },
                TemplateVariable {
                    name: "year".into(),
                    kind: VariableKind::Number,
                    description: None,
                    required: true,
                    default_value: Some(json!(2024)),
                },
            ])
            .expect("valid variables");

        let ctx = context_for(&user(), &GenerationOptions::default(), Map::new());
        let err = render(&template, &ctx).expect_err("author missing");
        assert_eq!(
            err,
            TemplateError::MissingVariables {
                template: "header".into(),
                names: vec!["author".into()],
            }
        );

        let mut supplied = Map::new();
        supplied.insert("author".into(), json!("ada"));
        let ctx = context_for(&user(), &GenerationOptions::default(), supplied);
        assert_eq!(render(&template, &ctx).expect("renders"), "// ada 2024");
    }
}
