//! Field type projections
//!
//! Each known [`FieldDataType`] maps to a storage type (SQL column), a host
//! type (TypeScript), an ORM scalar (Prisma) and a presentation hint (form
//! widget and table column kind). The table is total: unknown types fail
//! closed to a text column, `unknown` host type and a plain text input, and
//! the mapping is flagged so the caller can record a warning.

use serde::Serialize;
use tracing::warn;

use crate::metamodel::{Field, FieldDataType};

/// Presentation hint for generated forms and tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Presentation {
    pub form_widget: &'static str,
    pub column_kind: &'static str,
}

/// Every projection of a single field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeMapping {
    pub storage: String,
    pub host: &'static str,
    pub orm: &'static str,
    pub presentation: Presentation,
    /// True when the data type was unknown and defaults were used
    pub fallback: bool,
}

const FALLBACK_STORAGE: &str = "TEXT";
const FALLBACK_HOST: &str = "unknown";
const FALLBACK_ORM: &str = "String";
const FALLBACK_PRESENTATION: Presentation = Presentation {
    form_widget: "input-text",
    column_kind: "text",
};

const DEFAULT_STRING_LENGTH: i64 = 255;
const DEFAULT_PRECISION: i64 = 10;
const DEFAULT_SCALE: i64 = 2;

/// SQL column type, honouring length and precision where the type takes them
pub fn storage_type(
    data_type: &FieldDataType,
    length: Option<i64>,
    precision: Option<i64>,
    scale: Option<i64>,
) -> String {
    match data_type {
        FieldDataType::String => format!("VARCHAR({})", length.unwrap_or(DEFAULT_STRING_LENGTH)),
        FieldDataType::Text => "TEXT".to_string(),
        FieldDataType::Integer => "INTEGER".to_string(),
        FieldDataType::Decimal => format!(
            "DECIMAL({},{})",
            precision.unwrap_or(DEFAULT_PRECISION),
            scale.unwrap_or(DEFAULT_SCALE)
        ),
        FieldDataType::Boolean => "BOOLEAN".to_string(),
        FieldDataType::Date => "DATE".to_string(),
        FieldDataType::DateTime => "TIMESTAMP".to_string(),
        FieldDataType::Time => "TIME".to_string(),
        FieldDataType::Uuid => "UUID".to_string(),
        FieldDataType::Json => "JSON".to_string(),
        FieldDataType::Other(_) => FALLBACK_STORAGE.to_string(),
    }
}

/// TypeScript type used in generated declarations
pub fn host_type(data_type: &FieldDataType) -> &'static str {
    match data_type {
        FieldDataType::String | FieldDataType::Text | FieldDataType::Uuid => "string",
        FieldDataType::Integer | FieldDataType::Decimal => "number",
        FieldDataType::Boolean => "boolean",
        FieldDataType::Date | FieldDataType::DateTime | FieldDataType::Time => "Date",
        FieldDataType::Json => "Record<string, unknown>",
        FieldDataType::Other(_) => FALLBACK_HOST,
    }
}

/// Prisma scalar type
pub fn orm_type(data_type: &FieldDataType) -> &'static str {
    match data_type {
        FieldDataType::String | FieldDataType::Text | FieldDataType::Uuid => "String",
        FieldDataType::Integer => "Int",
        FieldDataType::Decimal => "Decimal",
        FieldDataType::Boolean => "Boolean",
        FieldDataType::Date | FieldDataType::DateTime | FieldDataType::Time => "DateTime",
        FieldDataType::Json => "Json",
        FieldDataType::Other(_) => FALLBACK_ORM,
    }
}

pub fn presentation(data_type: &FieldDataType) -> Presentation {
    let (form_widget, column_kind) = match data_type {
        FieldDataType::String | FieldDataType::Uuid => ("input-text", "text"),
        FieldDataType::Text => ("textarea", "text"),
        FieldDataType::Integer => ("input-number", "number"),
        FieldDataType::Decimal => ("input-decimal", "number"),
        FieldDataType::Boolean => ("switch", "boolean"),
        FieldDataType::Date => ("date-picker", "date"),
        FieldDataType::DateTime => ("datetime-picker", "datetime"),
        FieldDataType::Time => ("time-picker", "time"),
        FieldDataType::Json => ("json-editor", "json"),
        FieldDataType::Other(_) => return FALLBACK_PRESENTATION,
    };
    Presentation {
        form_widget,
        column_kind,
    }
}

/// Maps a field through every projection, warning once for unknown types
pub fn map_field(field: &Field) -> TypeMapping {
    let fallback = !field.data_type.is_known();
    if fallback {
        warn!(
            "Unknown data type '{}' on field '{}', falling back to {}",
            field.data_type, field.code, FALLBACK_STORAGE
        );
    }
    TypeMapping {
        storage: storage_type(&field.data_type, field.length, field.precision, field.scale),
        host: host_type(&field.data_type),
        orm: orm_type(&field.data_type),
        presentation: presentation(&field.data_type),
        fallback,
    }
}

/// File extension for generated source in a template language
pub fn file_extension(language: &str) -> &'static str {
    match language.to_lowercase().as_str() {
        "typescript" | "ts" => "ts",
        "javascript" | "js" => "js",
        "java" => "java",
        "python" | "py" => "py",
        "csharp" | "c#" | "cs" => "cs",
        "go" | "golang" => "go",
        "rust" | "rs" => "rs",
        "markdown" | "md" => "md",
        "sql" => "sql",
        "prisma" => "prisma",
        _ => "txt",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(data_type: FieldDataType) -> Field {
        Field::new("User", "value", data_type, 6).expect("valid field")
    }

    #[test]
    fn test_every_known_type_maps_without_fallback() {
        for dt in FieldDataType::known() {
            let mapping = map_field(&field(dt.clone()));
            assert!(!mapping.fallback, "{} fell back", dt);
            assert!(!mapping.storage.is_empty());
            assert_ne!(mapping.host, FALLBACK_HOST);
        }
    }

    #[test]
    fn test_unknown_type_fails_closed() {
        let mapping = map_field(&field(FieldDataType::Other("GEOMETRY".into())));
        assert!(mapping.fallback);
        assert_eq!(mapping.storage, "TEXT");
        assert_eq!(mapping.host, "unknown");
        assert_eq!(mapping.presentation, FALLBACK_PRESENTATION);
    }

    #[test]
    fn test_storage_type_honours_length_and_precision() {
        assert_eq!(storage_type(&FieldDataType::String, None, None, None), "VARCHAR(255)");
        assert_eq!(storage_type(&FieldDataType::String, Some(64), None, None), "VARCHAR(64)");
        assert_eq!(
            storage_type(&FieldDataType::Decimal, None, Some(12), Some(4)),
            "DECIMAL(12,4)"
        );
        assert_eq!(storage_type(&FieldDataType::DateTime, None, None, None), "TIMESTAMP");
    }

    #[test]
    fn test_host_types() {
        assert_eq!(host_type(&FieldDataType::Integer), "number");
        assert_eq!(host_type(&FieldDataType::Boolean), "boolean");
        assert_eq!(host_type(&FieldDataType::DateTime), "Date");
        assert_eq!(host_type(&FieldDataType::Uuid), "string");
    }

    #[test]
    fn test_file_extensions() {
        assert_eq!(file_extension("TypeScript"), "ts");
        assert_eq!(file_extension("csharp"), "cs");
        assert_eq!(file_extension("cobol"), "txt");
    }
}
