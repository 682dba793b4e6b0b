use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{MetamodelError, MetamodelResult};
use crate::naming::is_identifier;

/// Column data type of a field
///
/// Unknown type names are kept as `Other` so a model with a typo still loads;
/// the type mapper falls back to a safe default for them and warns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldDataType {
    String,
    Text,
    Integer,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Time,
    Uuid,
    Json,
    Other(String),
}

impl FieldDataType {
    /// Every known data type, in declaration order
    pub fn known() -> [FieldDataType; 10] {
        [
            FieldDataType::String,
            FieldDataType::Text,
            FieldDataType::Integer,
            FieldDataType::Decimal,
            FieldDataType::Boolean,
            FieldDataType::Date,
            FieldDataType::DateTime,
            FieldDataType::Time,
            FieldDataType::Uuid,
            FieldDataType::Json,
        ]
    }

    pub fn as_str(&self) -> &str {
        match self {
            FieldDataType::String => "STRING",
            FieldDataType::Text => "TEXT",
            FieldDataType::Integer => "INTEGER",
            FieldDataType::Decimal => "DECIMAL",
            FieldDataType::Boolean => "BOOLEAN",
            FieldDataType::Date => "DATE",
            FieldDataType::DateTime => "DATETIME",
            FieldDataType::Time => "TIME",
            FieldDataType::Uuid => "UUID",
            FieldDataType::Json => "JSON",
            FieldDataType::Other(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, FieldDataType::Other(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldDataType::Integer | FieldDataType::Decimal)
    }
}

impl From<String> for FieldDataType {
    fn from(value: String) -> Self {
        match value.to_uppercase().as_str() {
            "STRING" => FieldDataType::String,
            "TEXT" => FieldDataType::Text,
            "INTEGER" => FieldDataType::Integer,
            "DECIMAL" => FieldDataType::Decimal,
            "BOOLEAN" => FieldDataType::Boolean,
            "DATE" => FieldDataType::Date,
            "DATETIME" => FieldDataType::DateTime,
            "TIME" => FieldDataType::Time,
            "UUID" => FieldDataType::Uuid,
            "JSON" => FieldDataType::Json,
            _ => FieldDataType::Other(value),
        }
    }
}

impl From<FieldDataType> for String {
    fn from(value: FieldDataType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for FieldDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field codes reserved for the system-managed common fields
pub const COMMON_FIELD_CODES: [&str; 5] = ["id", "createdBy", "createdAt", "updatedBy", "updatedAt"];

/// Returns true when `code` names a common field. Case-sensitive.
pub fn is_common_field_code(code: &str) -> bool {
    COMMON_FIELD_CODES.contains(&code)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Field {
    pub id: String,
    #[serde(default)]
    pub entity_id: String,
    pub name: String,
    pub code: String,
    pub data_type: FieldDataType,
    #[serde(default)]
    pub length: Option<i64>,
    #[serde(default)]
    pub precision: Option<i64>,
    #[serde(default)]
    pub scale: Option<i64>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub display_order: i64,
    #[serde(default)]
    pub is_common: bool,
}

impl Field {
    pub fn new(
        entity_id: impl Into<String>,
        code: impl Into<String>,
        data_type: FieldDataType,
        display_order: i64,
    ) -> MetamodelResult<Self> {
        let entity_id = entity_id.into();
        let code = code.into();
        if !is_identifier(&code) {
            return Err(MetamodelError::InvalidIdentifier(code));
        }
        if display_order < 0 {
            return Err(MetamodelError::OutOfRange {
                attribute: "display_order",
                value: display_order,
            });
        }
        Ok(Field {
            id: format!("{}-{}", entity_id, code),
            entity_id,
            name: code.clone(),
            code,
            data_type,
            length: None,
            precision: None,
            scale: None,
            required: false,
            unique: false,
            default_value: None,
            comment: None,
            display_order,
            is_common: false,
        })
    }

    pub fn with_length(mut self, length: i64) -> MetamodelResult<Self> {
        if length <= 0 {
            return Err(MetamodelError::OutOfRange {
                attribute: "length",
                value: length,
            });
        }
        self.length = Some(length);
        Ok(self)
    }

    pub fn with_precision(mut self, precision: i64, scale: Option<i64>) -> MetamodelResult<Self> {
        if precision < 0 {
            return Err(MetamodelError::OutOfRange {
                attribute: "precision",
                value: precision,
            });
        }
        self.precision = Some(precision);
        self.scale = scale;
        Ok(self)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// True for a business field that reuses a reserved common-field code
    pub fn shadows_common_field(&self) -> bool {
        !self.is_common && is_common_field_code(&self.code)
    }
}

/// The five system-managed fields every entity carries, ordered 1 to 5
pub fn common_fields(entity_id: &str) -> Vec<Field> {
    let specs: [(&str, &str, FieldDataType, bool, bool); 5] = [
        ("id", "ID", FieldDataType::String, true, true),
        ("createdBy", "Created By", FieldDataType::String, true, false),
        ("createdAt", "Created At", FieldDataType::DateTime, true, false),
        ("updatedBy", "Updated By", FieldDataType::String, false, false),
        ("updatedAt", "Updated At", FieldDataType::DateTime, false, false),
    ];

    specs
        .into_iter()
        .enumerate()
        .map(|(i, (code, name, data_type, required, unique))| Field {
            id: format!("{}-{}", entity_id, code),
            entity_id: entity_id.to_string(),
            name: name.to_string(),
            code: code.to_string(),
            length: (data_type == FieldDataType::String).then_some(36),
            data_type,
            precision: None,
            scale: None,
            required,
            unique,
            default_value: None,
            comment: None,
            display_order: i as i64 + 1,
            is_common: true,
        })
        .collect()
}
