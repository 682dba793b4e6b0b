//! Declarative multi-entity join query specification
//!
//! ```text
//! JoinQuerySpec
//!   ├── base_entity_id
//!   ├── joins: Vec<JoinSpec>            relationship + join type (+ alias)
//!   ├── select_fields: Vec<SelectField> entity/field (+ alias, aggregation)
//!   ├── filters: Vec<FilterSpec>        entity/field, operator, value
//!   ├── sorting: Vec<SortSpec>
//!   ├── group_by: Vec<FieldRef>
//!   ├── having: Vec<HavingSpec>
//!   └── limit / offset / pagination
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    pub fn sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL OUTER JOIN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Aggregation {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    In,
    Between,
    IsNull,
    IsNotNull,
}

impl FilterOperator {
    /// Whether the operator binds no value at all
    pub fn is_unary(&self) -> bool {
        matches!(self, FilterOperator::IsNull | FilterOperator::IsNotNull)
    }

    /// Checks the value shape the operator needs
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FilterOperator::IsNull | FilterOperator::IsNotNull => true,
            FilterOperator::In => value.as_array().is_some_and(|a| !a.is_empty()),
            FilterOperator::Between => value.as_array().is_some_and(|a| a.len() == 2),
            FilterOperator::Like => value.is_string(),
            _ => !value.is_null() && !value.is_array() && !value.is_object(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Reference to a field on an entity in the join graph
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub entity_id: String,
    pub field_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JoinSpec {
    pub relationship_id: String,
    #[serde(default)]
    pub join_type: JoinType,
    #[serde(default)]
    pub alias: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SelectField {
    pub entity_id: String,
    pub field_id: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub aggregation: Option<Aggregation>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub entity_id: String,
    pub field_id: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub logical_operator: LogicalOperator,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub entity_id: String,
    pub field_id: String,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HavingSpec {
    pub aggregation: Aggregation,
    pub entity_id: String,
    pub field_id: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub size: u64,
}

impl Pagination {
    /// Rows skipped before this page, `None` when it does not fit in a u64
    pub fn offset(&self) -> Option<u64> {
        self.page.saturating_sub(1).checked_mul(self.size)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct JoinQuerySpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub base_entity_id: String,
    #[serde(default)]
    pub base_alias: Option<String>,
    #[serde(default)]
    pub joins: Vec<JoinSpec>,
    #[serde(default)]
    pub select_fields: Vec<SelectField>,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    #[serde(default)]
    pub sorting: Vec<SortSpec>,
    #[serde(default)]
    pub group_by: Vec<FieldRef>,
    #[serde(default)]
    pub having: Vec<HavingSpec>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

impl JoinQuerySpec {
    /// Limit and offset, with explicit values taking precedence over pagination
    pub fn limit_offset(&self) -> (Option<u64>, Option<u64>) {
        let (page_limit, page_offset) = match self.pagination {
            Some(pagination) if pagination.size > 0 => (Some(pagination.size), pagination.offset()),
            _ => (None, None),
        };
        (self.limit.or(page_limit), self.offset.or(page_offset))
    }

    /// Every field reference in the spec, in declaration order, tagged with where it came from
    pub fn field_refs(&self) -> Vec<(String, FieldRef)> {
        let mut refs = Vec::new();
        for (i, s) in self.select_fields.iter().enumerate() {
            refs.push((format!("select_fields[{}]", i), FieldRef {
                entity_id: s.entity_id.clone(),
                field_id: s.field_id.clone(),
            }));
        }
        for (i, f) in self.filters.iter().enumerate() {
            refs.push((format!("filters[{}]", i), FieldRef {
                entity_id: f.entity_id.clone(),
                field_id: f.field_id.clone(),
            }));
        }
        for (i, s) in self.sorting.iter().enumerate() {
            refs.push((format!("sorting[{}]", i), FieldRef {
                entity_id: s.entity_id.clone(),
                field_id: s.field_id.clone(),
            }));
        }
        for (i, g) in self.group_by.iter().enumerate() {
            refs.push((format!("group_by[{}]", i), g.clone()));
        }
        for (i, h) in self.having.iter().enumerate() {
            refs.push((format!("having[{}]", i), FieldRef {
                entity_id: h.entity_id.clone(),
                field_id: h.field_id.clone(),
            }));
        }
        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pagination_lowers_to_limit_offset() {
        let spec = JoinQuerySpec {
            base_entity_id: "User".into(),
            pagination: Some(Pagination { page: 3, size: 20 }),
            ..Default::default()
        };
        assert_eq!(spec.limit_offset(), (Some(20), Some(40)));

        let spec = JoinQuerySpec {
            limit: Some(5),
            ..spec
        };
        assert_eq!(spec.limit_offset(), (Some(5), Some(40)));
    }

    #[test]
    fn test_pagination_offset_overflow() {
        let huge = Pagination { page: u64::MAX, size: 2 };
        assert_eq!(huge.offset(), None);
        let spec = JoinQuerySpec {
            base_entity_id: "User".into(),
            pagination: Some(huge),
            ..Default::default()
        };
        assert_eq!(spec.limit_offset(), (Some(2), None));
        assert_eq!(Pagination { page: 0, size: 10 }.offset(), Some(0));
    }

    #[test]
    fn test_operator_value_shapes() {
        assert!(FilterOperator::Between.accepts(&json!([1, 10])));
        assert!(!FilterOperator::Between.accepts(&json!([1])));
        assert!(FilterOperator::In.accepts(&json!(["a", "b"])));
        assert!(!FilterOperator::In.accepts(&json!([])));
        assert!(FilterOperator::Eq.accepts(&json!("x")));
        assert!(!FilterOperator::Eq.accepts(&Value::Null));
        assert!(FilterOperator::IsNull.accepts(&Value::Null));
    }

    #[test]
    fn test_deserializes_from_yaml() {
        let spec: JoinQuerySpec = serde_yaml::from_str(
            r#"
base_entity_id: User
joins:
  - relationship_id: user-orders
    join_type: LEFT
select_fields:
  - entity_id: User
    field_id: User-email
filters:
  - entity_id: Order
    field_id: Order-total
    operator: gte
    value: 100
"#,
        )
        .expect("valid spec");
        assert_eq!(spec.joins[0].join_type, JoinType::Left);
        assert_eq!(spec.filters[0].operator, FilterOperator::Gte);
        assert_eq!(spec.filters[0].logical_operator, LogicalOperator::And);
        assert_eq!(spec.field_refs().len(), 2);
    }
}
