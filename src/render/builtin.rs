//! Built-in NestJS templates
//!
//! Used when a requested template code is not in the repository, and for the
//! test and readme artifacts added by `generate_tests` / `generate_docs`.

use crate::metamodel::Template;
use crate::materialize::ArtifactKind;

pub const BUILTIN_PROJECT: &str = "builtin";

/// Codes of every built-in template
pub const BUILTIN_CODES: [&str; 7] = ["entity", "dto", "service", "controller", "module", "test", "readme"];

pub fn get_template(code: &str) -> Option<&'static str> {
    let content = match code {
        "entity" => include_str!("templates/entity.hbs"),
        "dto" => include_str!("templates/dto.hbs"),
        "service" => include_str!("templates/service.hbs"),
        "controller" => include_str!("templates/controller.hbs"),
        "module" => include_str!("templates/module.hbs"),
        "test" => include_str!("templates/test.hbs"),
        "readme" => include_str!("templates/readme.hbs"),
        _ => return None,
    };
    Some(content)
}

/// Built-in template by code; `controller-template` style codes resolve too
pub fn builtin_template(code: &str) -> Option<Template> {
    let key = BUILTIN_CODES
        .iter()
        .find(|c| **c == code)
        .or_else(|| {
            let kind = ArtifactKind::for_template("", code);
            BUILTIN_CODES.iter().find(|c| **c == kind.to_string())
        })?;
    let content = get_template(key)?;
    let language = if *key == "readme" { "markdown" } else { "typescript" };

    let mut template = Template::new(BUILTIN_PROJECT, format!("Built-in {}", key), *key, language, content).ok()?;
    template.category = key.to_string();
    template.framework = Some("nestjs".to_string());
    Some(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metamodel::template::braces_balanced;

    #[test]
    fn test_every_builtin_resolves() {
        for code in BUILTIN_CODES {
            let template = builtin_template(code).expect("builtin exists");
            assert_eq!(template.code, code);
            assert!(braces_balanced(&template.content), "{} is unbalanced", code);
        }
    }

    #[test]
    fn test_builtin_by_kind_in_code() {
        let template = builtin_template("controller-template").expect("resolves by kind");
        assert_eq!(template.code, "controller");
        assert_eq!(template.category, "controller");
        assert!(builtin_template("other").is_none());
        assert_eq!(builtin_template("readme").map(|t| t.language), Some("markdown".into()));
    }
}
