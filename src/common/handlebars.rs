use handlebars::{handlebars_helper, no_escape, Handlebars};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{error, info};

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::metamodel::FieldDataType;
use crate::naming;
use crate::type_mapping;

pub fn create_path_if_not_exists(path: &str) -> anyhow::Result<()> {
    let path = Path::new(path)
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Invalid path: no parent directory for '{}'", path))?;
    if !path.as_os_str().is_empty() && !path.exists() {
        info!("Creating path: {:?}", path);
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

pub fn write_string_to_file(filename: &str, content: &str) -> anyhow::Result<()> {
    create_path_if_not_exists(filename)?;
    let path = Path::new(filename);
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn as_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

handlebars_helper!(pascal_case: |s: str| naming::to_pascal_case(s));
handlebars_helper!(camel_case: |s: str| naming::to_camel_case(s));
handlebars_helper!(kebab_case: |s: str| naming::to_kebab_case(s));
handlebars_helper!(snake_case: |s: str| naming::to_snake_case(s));
handlebars_helper!(pluralize: |s: str| naming::pluralize(s));

handlebars_helper!(ts_type: |t: str| type_mapping::host_type(&FieldDataType::from(t.to_string())));
handlebars_helper!(sql_type: |t: str| {
    type_mapping::storage_type(&FieldDataType::from(t.to_string()), None, None, None)
});
handlebars_helper!(form_type: |t: str| {
    type_mapping::presentation(&FieldDataType::from(t.to_string())).form_widget
});

handlebars_helper!(equals: |a: Value, b: Value| a == b);
handlebars_helper!(not_equals: |a: Value, b: Value| a != b);

handlebars_helper!(join: |list: Value, separator: str| {
    list.as_array()
        .map(|items| items.iter().map(as_text).collect::<Vec<String>>().join(separator))
        .unwrap_or_default()
});
handlebars_helper!(first: |list: Value| {
    list.as_array().and_then(|items| items.first()).cloned().unwrap_or(Value::Null)
});
handlebars_helper!(last: |list: Value| {
    list.as_array().and_then(|items| items.last()).cloned().unwrap_or(Value::Null)
});

handlebars_helper!(exists: |v: Value| {
    match v {
        Value::Null => false,
        Value::String(s) => {
            let trimmed = s.trim();
            !trimmed.is_empty() && trimmed != "null"
        }
        _ => true,
    }
});
handlebars_helper!(isnull: |v: Value| v.is_null());
handlebars_helper!(is_empty: |v: Value| {
    match v {
        Value::Array(arr) => arr.is_empty(),
        _ => false,
    }
});

/// Helper names registered on every registry built from a [`HelperTable`]
pub const HELPER_NAMES: &[&str] = &[
    "pascalCase",
    "camelCase",
    "kebabCase",
    "snakeCase",
    "pluralize",
    "tsType",
    "sqlType",
    "formType",
    "eq",
    "ifEquals",
    "ifNotEquals",
    "join",
    "first",
    "last",
    "exists",
    "isnull",
    "is_empty",
];

/// Helpers and partials available to templates
///
/// Every call to [`HelperTable::build`] returns a fresh registry, so
/// concurrent renders never share mutable state.
#[derive(Debug, Clone, Default)]
pub struct HelperTable {
    strict: bool,
    partials: IndexMap<String, String>,
}

impl HelperTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Missing keys become render errors
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_partial(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.partials.insert(name.into(), content.into());
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn build(&self) -> Handlebars<'static> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(no_escape);
        handlebars.set_strict_mode(self.strict);

        handlebars.register_helper("pascalCase", Box::new(pascal_case));
        handlebars.register_helper("camelCase", Box::new(camel_case));
        handlebars.register_helper("kebabCase", Box::new(kebab_case));
        handlebars.register_helper("snakeCase", Box::new(snake_case));
        handlebars.register_helper("pluralize", Box::new(pluralize));
        handlebars.register_helper("tsType", Box::new(ts_type));
        handlebars.register_helper("sqlType", Box::new(sql_type));
        handlebars.register_helper("formType", Box::new(form_type));
        handlebars.register_helper("eq", Box::new(equals));
        handlebars.register_helper("ifEquals", Box::new(equals));
        handlebars.register_helper("ifNotEquals", Box::new(not_equals));
        handlebars.register_helper("join", Box::new(join));
        handlebars.register_helper("first", Box::new(first));
        handlebars.register_helper("last", Box::new(last));
        handlebars.register_helper("exists", Box::new(exists));
        handlebars.register_helper("isnull", Box::new(isnull));
        handlebars.register_helper("is_empty", Box::new(is_empty));

        for (name, content) in &self.partials {
            if let Err(err) = handlebars.register_partial(name, content) {
                error!("Failed to register partial '{}': {}", name, err);
            }
        }

        handlebars
    }
}

pub fn get_handlebars() -> Handlebars<'static> {
    HelperTable::default().build()
}
