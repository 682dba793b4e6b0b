//! Identifier case conversion and validation
//!
//! All conversions are pure. For normalised identifiers (letters, digits and
//! single separators, no digit directly after a separator) the following hold:
//!
//! ```text
//! to_snake_case(to_camel_case(to_snake_case(s))) == to_snake_case(s)
//! to_snake_case(to_kebab_case(to_snake_case(s))) == to_snake_case(s)
//! ```

use heck::{ToKebabCase, ToLowerCamelCase, ToPascalCase, ToSnakeCase};
use regex::Regex;
use std::sync::OnceLock;

static IDENTIFIER: OnceLock<Option<Regex>> = OnceLock::new();
static TEMPLATE_CODE: OnceLock<Option<Regex>> = OnceLock::new();
static TAG: OnceLock<Option<Regex>> = OnceLock::new();

/// Maximum length of a template tag
pub const MAX_TAG_LENGTH: usize = 50;

fn matches_pattern(cell: &OnceLock<Option<Regex>>, pattern: &str, s: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(s))
}

/// Entity, field and relationship codes: a letter followed by letters, digits or underscores
pub fn is_identifier(s: &str) -> bool {
    matches_pattern(&IDENTIFIER, r"^[A-Za-z][A-Za-z0-9_]*$", s)
}

/// Template codes additionally allow hyphens
pub fn is_template_code(s: &str) -> bool {
    matches_pattern(&TEMPLATE_CODE, r"^[A-Za-z][A-Za-z0-9_-]*$", s)
}

pub fn is_tag(s: &str) -> bool {
    s.len() <= MAX_TAG_LENGTH && matches_pattern(&TAG, r"^[A-Za-z0-9_-]+$", s)
}

pub fn to_pascal_case(s: &str) -> String {
    s.to_pascal_case()
}

pub fn to_camel_case(s: &str) -> String {
    s.to_lower_camel_case()
}

pub fn to_kebab_case(s: &str) -> String {
    s.to_kebab_case()
}

pub fn to_snake_case(s: &str) -> String {
    s.to_snake_case()
}

/// Naive English plural used for route and collection names
pub fn pluralize(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    let lower = s.to_lowercase();
    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        format!("{}es", s)
    } else if lower.ends_with('y')
        && !matches!(
            lower.chars().rev().nth(1),
            Some('a' | 'e' | 'i' | 'o' | 'u')
        )
    {
        format!("{}ies", &s[..s.len() - 1])
    } else {
        format!("{}s", s)
    }
}

/// All derived names for one identifier, as exposed to templates
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct NameSet {
    pub original: String,
    pub pascal: String,
    pub camel: String,
    pub kebab: String,
    pub snake: String,
    pub plural_kebab: String,
}

impl NameSet {
    pub fn of(code: &str) -> Self {
        let kebab = to_kebab_case(code);
        NameSet {
            original: code.to_string(),
            pascal: to_pascal_case(code),
            camel: to_camel_case(code),
            plural_kebab: pluralize(&kebab),
            snake: to_snake_case(code),
            kebab,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "User",
        "userProfile",
        "OrderItem",
        "order_item",
        "createdAt",
        "HTTPRequest",
        "customer_order_line",
        "a",
        "Address2",
    ];

    #[test]
    fn test_identifier_pattern() {
        assert!(is_identifier("User"));
        assert!(is_identifier("order_item2"));
        assert!(!is_identifier("1user"));
        assert!(!is_identifier("_user"));
        assert!(!is_identifier("user-name"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_template_code_and_tag_patterns() {
        assert!(is_template_code("nest-service"));
        assert!(!is_template_code("-service"));
        assert!(is_tag("backend_v2"));
        assert!(!is_tag("has space"));
        assert!(!is_tag(&"x".repeat(51)));
    }

    #[test]
    fn test_case_conversions() {
        assert_eq!(to_pascal_case("order_item"), "OrderItem");
        assert_eq!(to_camel_case("OrderItem"), "orderItem");
        assert_eq!(to_kebab_case("OrderItem"), "order-item");
        assert_eq!(to_snake_case("userProfile"), "user_profile");
        assert_eq!(to_snake_case("User"), "user");
    }

    #[test]
    fn test_snake_camel_snake_is_idempotent() {
        for s in SAMPLES {
            let snake = to_snake_case(s);
            assert_eq!(to_snake_case(&to_camel_case(&snake)), snake, "for {}", s);
        }
    }

    #[test]
    fn test_snake_kebab_snake_is_idempotent() {
        for s in SAMPLES {
            let snake = to_snake_case(s);
            assert_eq!(to_snake_case(&to_kebab_case(&snake)), snake, "for {}", s);
        }
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("user"), "users");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("key"), "keys");
        assert_eq!(pluralize("address"), "addresses");
        assert_eq!(pluralize("order-item"), "order-items");
    }

    #[test]
    fn test_name_set() {
        let names = NameSet::of("OrderItem");
        assert_eq!(names.pascal, "OrderItem");
        assert_eq!(names.camel, "orderItem");
        assert_eq!(names.kebab, "order-item");
        assert_eq!(names.snake, "order_item");
        assert_eq!(names.plural_kebab, "order-items");
    }
}
