//! Metamodel types
//!
//! Entities own their fields; relationships connect entities within one
//! project; templates own their version history; join query specifications
//! reference entities, fields and relationships by id; generation tasks
//! record the outcome of a generation run.

pub mod config_value;
pub mod entity;
pub mod field;
pub mod join_query;
pub mod relationship;
pub mod task;
pub mod template;
pub mod view;

pub use config_value::{ConfigValue, JoinTableConfig};
pub use entity::{Entity, EntityStatus};
pub use field::{common_fields, is_common_field_code, Field, FieldDataType, COMMON_FIELD_CODES};
pub use join_query::{
    Aggregation, FieldRef, FilterOperator, FilterSpec, HavingSpec, JoinQuerySpec, JoinSpec,
    JoinType, LogicalOperator, Pagination, SelectField, SortDirection, SortSpec,
};
pub use relationship::{ReferentialAction, Relationship, RelationshipType};
pub use task::{
    GenerationTask, LogLevel, TaskConfig, TaskLogEntry, TaskSettings, TaskStatus, TaskSummary,
    TaskType,
};
pub use template::{
    Template, TemplateStatus, TemplateVariable, TemplateVersion, VariableKind,
};
pub use view::ModelView;
