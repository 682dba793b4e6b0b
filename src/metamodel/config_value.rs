use serde::{Deserialize, Serialize};

/// Configuration blob with a known shape and a passthrough for everything else
///
/// Deserialization tries the known shape first; anything that does not match
/// is kept verbatim so round-tripping a model never loses data.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ConfigValue<T> {
    Known(T),
    Opaque(serde_json::Value),
}

impl<T> ConfigValue<T> {
    pub fn known(&self) -> Option<&T> {
        match self {
            ConfigValue::Known(value) => Some(value),
            ConfigValue::Opaque(_) => None,
        }
    }
}

impl<T: Default> Default for ConfigValue<T> {
    fn default() -> Self {
        ConfigValue::Known(T::default())
    }
}

/// Join table used to lower a many-to-many relationship
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JoinTableConfig {
    pub table_name: String,
    pub source_column: String,
    pub target_column: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_shape_is_recognised() {
        let value: ConfigValue<JoinTableConfig> = serde_json::from_value(serde_json::json!({
            "table_name": "user_roles",
            "source_column": "user_id",
            "target_column": "role_id"
        }))
        .expect("valid config");
        assert_eq!(
            value.known().map(|c| c.table_name.as_str()),
            Some("user_roles")
        );
    }

    #[test]
    fn test_unknown_shape_passes_through() {
        let raw = serde_json::json!({"color": "red", "weight": 3});
        let value: ConfigValue<JoinTableConfig> =
            serde_json::from_value(raw.clone()).expect("valid config");
        assert!(value.known().is_none());
        assert_eq!(serde_json::to_value(&value).expect("serializes"), raw);
    }
}
