//! Join query synthesis
//!
//! A validated [`JoinQuerySpec`] is lowered into a [`QueryPlan`] (the join
//! graph plus every column reference resolved to its entity and field), and
//! each emitter turns the plan into one artifact:
//!
//! - [`sql`]: parameterised SQL text and its positional parameters
//! - [`orm`]: Prisma-shaped `findMany` arguments
//! - [`types`]: TypeScript row and list-response declarations
//! - [`api_stub`]: NestJS controller stub
//! - [`docs`]: markdown documentation

pub mod api_stub;
pub mod docs;
pub mod graph;
pub mod orm;
pub mod sql;
pub mod types;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::errors::{QueryError, QueryResult};
use crate::materialize::{resolve_join_path, PendingFile};
use crate::metamodel::{Aggregation, Entity, Field, JoinQuerySpec, ModelView, SelectField};
use crate::naming::{to_snake_case, NameSet};
use crate::options::GenerationOptions;
use crate::type_mapping::host_type;
use crate::validation::join_query::check_join_query;

pub use graph::{JoinGraph, JoinNode, JoinStep};

/// Everything synthesised from one join query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryArtifacts {
    pub sql: String,
    pub parameters: Vec<Value>,
    pub orm_query: Value,
    pub type_declaration: String,
    pub api_stub: String,
    pub documentation: String,
    pub warnings: Vec<String>,
}

impl QueryArtifacts {
    /// Files to write for a query on `base_code`, under `src/<kebab>-join/`
    pub fn pending_files(&self, base_code: &str) -> Vec<PendingFile> {
        let names = NameSet::of(base_code);
        let orm = serde_json::to_string_pretty(&self.orm_query).unwrap_or_default();
        [
            ("sql", self.sql.clone()),
            ("prisma.json", orm),
            ("types.ts", self.type_declaration.clone()),
            ("controller.ts", self.api_stub.clone()),
            ("md", self.documentation.clone()),
        ]
        .into_iter()
        .map(|(suffix, content)| PendingFile {
            path: resolve_join_path(&names, suffix),
            content,
        })
        .collect()
    }
}

/// Column name of a field in its table
pub fn column_name(field: &Field) -> String {
    to_snake_case(&field.code)
}

/// Double-quotes an SQL identifier
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// A field resolved against the join graph
#[derive(Debug, Clone)]
pub struct ColumnRef<'a> {
    pub entity: &'a Entity,
    pub field: &'a Field,
    pub table_alias: String,
}

impl ColumnRef<'_> {
    pub fn column(&self) -> String {
        column_name(self.field)
    }

    /// `"alias"."column"`
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.table_alias), quote_ident(&self.column()))
    }

    /// Parameter and default output name, `alias_column`
    pub fn flat_name(&self) -> String {
        format!("{}_{}", self.table_alias, self.column())
    }
}

/// Resolves a field reference to the table alias it is read from
pub fn resolve_column<'a>(
    graph: &JoinGraph<'a>,
    view: &ModelView<'a>,
    entity_id: &str,
    field_id: &str,
) -> Option<ColumnRef<'a>> {
    let entity = view.entity(entity_id)?;
    let field = view.field(entity_id, field_id)?;
    let table_alias = graph.alias_of(entity_id)?.to_string();
    Some(ColumnRef {
        entity,
        field,
        table_alias,
    })
}

/// Name of a selected column in the result row: the user alias, else
/// `alias_column`, prefixed with the aggregation when there is one
pub fn output_name(select: &SelectField, column: &ColumnRef<'_>) -> String {
    match (&select.alias, select.aggregation) {
        (Some(alias), _) => alias.clone(),
        (None, Some(aggregation)) => format!(
            "{}_{}",
            aggregation.to_string().to_lowercase(),
            column.flat_name()
        ),
        (None, None) => column.flat_name(),
    }
}

/// One output column of the query
#[derive(Debug, Clone)]
pub struct Projection<'a> {
    pub column: ColumnRef<'a>,
    pub alias: String,
    pub aggregation: Option<Aggregation>,
}

impl Projection<'_> {
    /// TypeScript type of the output column; aggregates are always numbers
    pub fn host_type(&self) -> &'static str {
        match self.aggregation {
            Some(_) => "number",
            None => host_type(&self.column.field.data_type),
        }
    }
}

/// A validated query with every reference resolved
pub struct QueryPlan<'s, 'a> {
    pub spec: &'s JoinQuerySpec,
    pub graph: JoinGraph<'a>,
    view: &'s ModelView<'a>,
}

impl<'s, 'a> QueryPlan<'s, 'a> {
    pub fn base(&self) -> &'a Entity {
        self.graph.base.entity
    }

    pub fn column(&self, entity_id: &str, field_id: &str) -> Option<ColumnRef<'a>> {
        resolve_column(&self.graph, self.view, entity_id, field_id)
    }

    /// Output columns in select order; an empty projection yields the base entity's fields
    pub fn projections(&self) -> Vec<Projection<'a>> {
        if self.spec.select_fields.is_empty() {
            let base = self.base();
            return base
                .sorted_fields()
                .into_iter()
                .map(|field| Projection {
                    alias: column_name(field),
                    column: ColumnRef {
                        entity: base,
                        field,
                        table_alias: self.graph.base.alias.clone(),
                    },
                    aggregation: None,
                })
                .collect();
        }

        self.spec
            .select_fields
            .iter()
            .filter_map(|select| {
                let column = self.column(&select.entity_id, &select.field_id)?;
                let alias = output_name(select, &column);
                Some(Projection {
                    column,
                    alias,
                    aggregation: select.aggregation,
                })
            })
            .collect()
    }

    /// Type name prefix shared by the generated declarations and controller
    pub fn type_prefix(&self) -> String {
        format!("{}Join", crate::naming::to_pascal_case(&self.base().code))
    }
}

/// Validates the specification and lowers it into every artifact
pub fn synthesize(
    spec: &JoinQuerySpec,
    view: &ModelView<'_>,
    options: &GenerationOptions,
) -> QueryResult<QueryArtifacts> {
    info!("Synthesizing join query on base entity '{}'", spec.base_entity_id);

    let (report, graph) = check_join_query(spec, view, options.empty_projection);
    let graph = match graph {
        Some(graph) if report.valid => graph,
        _ => return Err(QueryError::Invalid(report)),
    };

    let plan = QueryPlan { spec, graph, view };
    let mut warnings = report.warnings;

    let (sql, parameters) = sql::lower(&plan);
    let orm_query = orm::lower(&plan, &mut warnings);
    let type_declaration = types::render(&plan)?;
    let api_stub = api_stub::render(&plan)?;
    let documentation = docs::render(&plan)?;

    debug!(
        "Join query on '{}' lowered with {} parameter(s) and {} warning(s)",
        spec.base_entity_id,
        parameters.len(),
        warnings.len()
    );

    Ok(QueryArtifacts {
        sql,
        parameters,
        orm_query,
        type_declaration,
        api_stub,
        documentation,
        warnings,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::metamodel::{
        Entity, Field, FieldDataType, JoinQuerySpec, JoinSpec, JoinType, ReferentialAction,
        Relationship, RelationshipType, SelectField, SortDirection, SortSpec,
    };
    use crate::metamodel::{FilterOperator, FilterSpec, LogicalOperator};
    use serde_json::json;

    pub fn relationship(id: &str, kind: RelationshipType, source: &str, target: &str) -> Relationship {
        Relationship {
            id: id.into(),
            project_id: "p1".into(),
            name: id.into(),
            code: id.into(),
            relationship_type: kind,
            source_entity_id: source.into(),
            target_entity_id: target.into(),
            source_field_id: None,
            target_field_id: None,
            foreign_key_name: None,
            on_delete: ReferentialAction::Cascade,
            on_update: ReferentialAction::Cascade,
            config: None,
        }
    }

    /// User 1:N Order on `Order.userId -> User.id`
    pub fn shop() -> (Vec<Entity>, Vec<Relationship>) {
        let mut user = Entity::new("p1", "User", "User").expect("valid entity");
        user.ensure_common_fields();
        user.add_field(
            Field::new("User", "email", FieldDataType::String, 6)
                .expect("field")
                .required(),
        );
        let mut order = Entity::new("p1", "Order", "Order").expect("valid entity");
        order.ensure_common_fields();
        order.add_field(Field::new("Order", "userId", FieldDataType::String, 6).expect("field"));
        order.add_field(Field::new("Order", "total", FieldDataType::Decimal, 7).expect("field"));

        let mut rel = relationship("userOrders", RelationshipType::OneToMany, "User", "Order");
        rel.name = "User orders".into();
        rel.target_field_id = Some("Order-userId".into());
        (vec![user, order], vec![rel])
    }

    pub fn select(entity: &str, field: &str) -> SelectField {
        SelectField {
            entity_id: entity.into(),
            field_id: field.into(),
            alias: None,
            aggregation: None,
        }
    }

    /// Emails of users with orders above 100, sorted by email
    pub fn big_orders() -> JoinQuerySpec {
        JoinQuerySpec {
            base_entity_id: "User".into(),
            joins: vec![JoinSpec {
                relationship_id: "userOrders".into(),
                join_type: JoinType::Inner,
                alias: None,
            }],
            select_fields: vec![select("User", "email"), select("Order", "total")],
            filters: vec![FilterSpec {
                entity_id: "Order".into(),
                field_id: "total".into(),
                operator: FilterOperator::Gt,
                value: json!(100),
                logical_operator: LogicalOperator::And,
            }],
            sorting: vec![SortSpec {
                entity_id: "User".into(),
                field_id: "email".into(),
                direction: SortDirection::Asc,
            }],
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::options::EmptyProjectionPolicy;
    use crate::validation::Rule;

    #[test]
    fn test_synthesize_produces_every_artifact() {
        let (entities, relationships) = shop();
        let view = ModelView::new(&entities, &relationships);
        let artifacts = synthesize(&big_orders(), &view, &GenerationOptions::default())
            .expect("valid query");

        assert_eq!(artifacts.sql.matches("JOIN").count(), 1);
        assert_eq!(artifacts.parameters, vec![serde_json::json!(100)]);
        assert!(artifacts.type_declaration.contains("UserJoinResult"));
        assert!(artifacts.api_stub.contains("UserJoinController"));
        assert!(artifacts.documentation.contains("User orders"));
        assert!(artifacts.warnings.is_empty());
    }

    #[test]
    fn test_artifacts_land_in_join_folder() {
        let (entities, relationships) = shop();
        let view = ModelView::new(&entities, &relationships);
        let artifacts = synthesize(&big_orders(), &view, &GenerationOptions::default())
            .expect("valid query");
        let files = artifacts.pending_files("User");
        let paths: Vec<String> = files.iter().map(|f| f.path.display().to_string()).collect();
        assert_eq!(
            paths,
            vec![
                "src/user-join/user-join.sql",
                "src/user-join/user-join.prisma.json",
                "src/user-join/user-join.types.ts",
                "src/user-join/user-join.controller.ts",
                "src/user-join/user-join.md",
            ]
        );
        assert_eq!(files[0].content, artifacts.sql);
    }

    #[test]
    fn test_invalid_query_returns_report() {
        let (entities, relationships) = shop();
        let view = ModelView::new(&entities, &relationships);
        let mut spec = big_orders();
        spec.joins.clear();

        let err = synthesize(&spec, &view, &GenerationOptions::default()).expect_err("invalid");
        let report = err.report().expect("report");
        assert!(report.has_rule(Rule::Unreachable));
    }

    #[test]
    fn test_empty_projection_selects_base_columns() {
        let (entities, relationships) = shop();
        let view = ModelView::new(&entities, &relationships);
        let mut spec = big_orders();
        spec.select_fields.clear();

        let artifacts = synthesize(&spec, &view, &GenerationOptions::default()).expect("valid");
        assert!(artifacts.sql.starts_with("SELECT \"user\".*"));
        assert_eq!(artifacts.warnings.len(), 1);
        assert!(artifacts.type_declaration.contains("  email: string;"));

        let options = GenerationOptions {
            empty_projection: EmptyProjectionPolicy::Reject,
            ..Default::default()
        };
        assert!(synthesize(&spec, &view, &options).is_err());
    }

    #[test]
    fn test_default_projection_aliases() {
        let (entities, relationships) = shop();
        let view = ModelView::new(&entities, &relationships);
        let mut spec = big_orders();
        spec.select_fields[1].aggregation = Some(Aggregation::Sum);
        spec.group_by.push(crate::metamodel::FieldRef {
            entity_id: "User".into(),
            field_id: "email".into(),
        });
        let (report, graph) = check_join_query(&spec, &view, EmptyProjectionPolicy::Warn);
        assert!(report.valid, "{:?}", report.errors);
        let plan = QueryPlan {
            spec: &spec,
            graph: graph.expect("graph"),
            view: &view,
        };
        let aliases: Vec<String> = plan.projections().into_iter().map(|p| p.alias).collect();
        assert_eq!(aliases, vec!["user_email", "sum_order_total"]);
        assert_eq!(plan.type_prefix(), "UserJoin");
    }

    #[test]
    fn test_colliding_output_columns_are_rejected() {
        let (entities, relationships) = shop();
        let view = ModelView::new(&entities, &relationships);
        let mut spec = big_orders();
        spec.select_fields.push(SelectField {
            alias: Some("user_email".into()),
            ..select("User", "email")
        });

        let err = synthesize(&spec, &view, &GenerationOptions::default()).expect_err("duplicate");
        let report = err.report().expect("report");
        assert!(report.has_rule(Rule::Duplicate));
    }

    #[test]
    fn test_huge_page_is_a_violation_not_a_panic() {
        let (entities, relationships) = shop();
        let view = ModelView::new(&entities, &relationships);
        let mut spec = big_orders();
        spec.pagination = Some(crate::metamodel::Pagination { page: u64::MAX, size: 2 });

        let err = synthesize(&spec, &view, &GenerationOptions::default()).expect_err("overflow");
        let report = err.report().expect("report");
        assert!(report.has_rule(Rule::Range));
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("order"), "\"order\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
