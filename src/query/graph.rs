//! Join graph construction
//!
//! The graph is rooted at the base entity and grows one join at a time, in
//! declaration order. A join must attach to an entity already in the graph
//! and bring in exactly one new entity, so the result is always a tree and
//! the emitted `JOIN` clauses never reference an alias before it exists.

use std::collections::{HashMap, HashSet};

use crate::metamodel::{Entity, JoinQuerySpec, JoinType, ModelView, Relationship};
use crate::naming::to_snake_case;
use crate::validation::{Rule, Violation};

#[derive(Debug, Clone)]
pub struct JoinNode<'a> {
    pub entity: &'a Entity,
    pub alias: String,
}

#[derive(Debug, Clone)]
pub struct JoinStep<'a> {
    pub relationship: &'a Relationship,
    pub join_type: JoinType,
    /// Node already in the graph
    pub from: JoinNode<'a>,
    /// Node this join brings in
    pub to: JoinNode<'a>,
    /// True when `from` is the relationship's source end
    pub forward: bool,
}

#[derive(Debug, Clone)]
pub struct JoinGraph<'a> {
    pub base: JoinNode<'a>,
    pub steps: Vec<JoinStep<'a>>,
    aliases: HashMap<String, String>,
}

impl<'a> JoinGraph<'a> {
    /// Builds the graph, reporting every join or reference that does not fit.
    ///
    /// Returns no graph only when the base entity itself cannot be resolved.
    pub fn build(spec: &JoinQuerySpec, view: &ModelView<'a>) -> (Option<JoinGraph<'a>>, Vec<Violation>) {
        let mut violations = Vec::new();

        let Some(base_entity) = view.entity(&spec.base_entity_id) else {
            if !spec.base_entity_id.trim().is_empty() {
                violations.push(Violation::new(
                    "base_entity_id",
                    Rule::UnknownReference,
                    format!("base entity '{}' does not exist", spec.base_entity_id),
                ));
            }
            return (None, violations);
        };

        let base_alias = spec
            .base_alias
            .clone()
            .unwrap_or_else(|| to_snake_case(&base_entity.code));
        let base = JoinNode {
            entity: base_entity,
            alias: base_alias.clone(),
        };

        let mut aliases: HashMap<String, String> = HashMap::new();
        aliases.insert(base_entity.id.clone(), base_alias.clone());
        let mut used_aliases: HashSet<String> = HashSet::from([base_alias]);
        let mut steps = Vec::new();

        for (i, join) in spec.joins.iter().enumerate() {
            let path = format!("joins[{}].relationship_id", i);
            if join.relationship_id.trim().is_empty() {
                continue;
            }
            let Some(relationship) = view.relationship(&join.relationship_id) else {
                violations.push(Violation::new(
                    path,
                    Rule::UnknownReference,
                    format!("relationship '{}' does not exist", join.relationship_id),
                ));
                continue;
            };

            if !relationship.project_id.is_empty() && relationship.project_id != base_entity.project_id {
                violations.push(Violation::new(
                    path.clone(),
                    Rule::CrossProject,
                    format!(
                        "relationship '{}' belongs to project '{}', not '{}'",
                        relationship.code, relationship.project_id, base_entity.project_id
                    ),
                ));
                continue;
            }

            let source_in = aliases.contains_key(&relationship.source_entity_id);
            let target_in = aliases.contains_key(&relationship.target_entity_id);
            let (from_id, to_id, forward) = match (source_in, target_in) {
                (true, false) => (&relationship.source_entity_id, &relationship.target_entity_id, true),
                (false, true) => (&relationship.target_entity_id, &relationship.source_entity_id, false),
                (true, true) => {
                    violations.push(Violation::new(
                        path,
                        Rule::Duplicate,
                        format!(
                            "relationship '{}' joins two entities that are already in the join graph",
                            relationship.code
                        ),
                    ));
                    continue;
                }
                (false, false) => {
                    violations.push(Violation::new(
                        path,
                        Rule::JoinDisconnected,
                        format!(
                            "relationship '{}' does not connect to any entity already joined",
                            relationship.code
                        ),
                    ));
                    continue;
                }
            };

            let Some(to_entity) = view.entity(to_id) else {
                violations.push(Violation::new(
                    path,
                    Rule::UnknownReference,
                    format!("entity '{}' does not exist", to_id),
                ));
                continue;
            };

            let alias = join
                .alias
                .clone()
                .unwrap_or_else(|| to_snake_case(&to_entity.code));
            if !used_aliases.insert(alias.clone()) {
                violations.push(Violation::new(
                    format!("joins[{}].alias", i),
                    Rule::Duplicate,
                    format!("alias '{}' is already used in this query", alias),
                ));
                continue;
            }

            let from_alias = aliases.get(from_id).cloned().unwrap_or_default();
            let Some(from_entity) = view.entity(from_id) else {
                continue;
            };
            aliases.insert(to_entity.id.clone(), alias.clone());
            steps.push(JoinStep {
                relationship,
                join_type: join.join_type,
                from: JoinNode {
                    entity: from_entity,
                    alias: from_alias,
                },
                to: JoinNode {
                    entity: to_entity,
                    alias,
                },
                forward,
            });
        }

        let graph = JoinGraph {
            base,
            steps,
            aliases,
        };

        for (path, field_ref) in spec.field_refs() {
            if field_ref.entity_id.trim().is_empty() || field_ref.field_id.trim().is_empty() {
                continue;
            }
            if view.entity(&field_ref.entity_id).is_none() {
                violations.push(Violation::new(
                    format!("{}.entity_id", path),
                    Rule::UnknownReference,
                    format!("entity '{}' does not exist", field_ref.entity_id),
                ));
                continue;
            }
            if graph.alias_of(&field_ref.entity_id).is_none() {
                violations.push(Violation::new(
                    format!("{}.entity_id", path),
                    Rule::Unreachable,
                    format!(
                        "entity '{}' is not part of the join graph rooted at '{}'",
                        field_ref.entity_id, spec.base_entity_id
                    ),
                ));
            }
            if view.field(&field_ref.entity_id, &field_ref.field_id).is_none() {
                violations.push(Violation::new(
                    format!("{}.field_id", path),
                    Rule::UnknownReference,
                    format!(
                        "field '{}' does not exist on entity '{}'",
                        field_ref.field_id, field_ref.entity_id
                    ),
                ));
            }
        }

        (Some(graph), violations)
    }

    pub fn alias_of(&self, entity_id: &str) -> Option<&str> {
        self.aliases.get(entity_id).map(String::as_str)
    }

    /// Every node in join order, base first
    pub fn nodes(&self) -> impl Iterator<Item = &JoinNode<'a>> {
        std::iter::once(&self.base).chain(self.steps.iter().map(|s| &s.to))
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.aliases.contains_key(entity_id)
    }
}
