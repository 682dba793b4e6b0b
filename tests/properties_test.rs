//! Whole-crate properties
//!
//! Naming idempotence, validator totality, type mapping totality, write
//! atomicity and join graph soundness.

use anyhow::Result;
use std::collections::HashSet;

use modelforge::materialize::{materialize, PendingFile, WriteOptions};
use modelforge::metamodel::{
    Entity, Field, FieldDataType, JoinQuerySpec, JoinSpec, ModelView, ReferentialAction,
    Relationship, RelationshipType, SelectField,
};
use modelforge::naming::{to_camel_case, to_kebab_case, to_snake_case};
use modelforge::options::EmptyProjectionPolicy;
use modelforge::type_mapping::map_field;
use modelforge::validation::{validate_join_query, validate_model, Rule};

#[test]
fn test_naming_round_trips_are_stable() {
    let identifiers = [
        "User",
        "userAccount",
        "UserAccount",
        "user_account",
        "orderLineItem",
        "HTTPServer",
        "a1b2",
        "x",
    ];
    for s in identifiers {
        let snake = to_snake_case(s);
        assert_eq!(to_snake_case(&to_camel_case(&snake)), snake, "{}", s);
        assert_eq!(to_snake_case(&to_kebab_case(&snake)), snake, "{}", s);
    }
}

fn field(entity: &str, seed: &str, code: &str, order: i64) -> Result<Field> {
    let mut field = Field::new(entity, seed, FieldDataType::String, order)?;
    field.code = code.to_string();
    Ok(field)
}

#[test]
fn test_validator_reports_every_independent_violation() -> Result<()> {
    let mut user = Entity::new("shop", "User", "User")?;
    user.ensure_common_fields();
    user.add_field(field("User", "first", "1st", 6)?);
    user.add_field(field("User", "second", "has space", 7)?);
    user.add_field(field("User", "third", "x-y", 8)?);
    let mut short = Field::new("User", "nickname", FieldDataType::String, 9)?;
    short.length = Some(-1);
    user.add_field(short);

    let dangling = Relationship {
        id: "userGhosts".into(),
        project_id: "shop".into(),
        name: "User ghosts".into(),
        code: "userGhosts".into(),
        relationship_type: RelationshipType::OneToMany,
        source_entity_id: "User".into(),
        target_entity_id: "Ghost".into(),
        source_field_id: None,
        target_field_id: None,
        foreign_key_name: None,
        on_delete: ReferentialAction::Restrict,
        on_update: ReferentialAction::Restrict,
        config: None,
    };

    let entities = vec![user];
    let relationships = vec![dangling];
    let report = validate_model(&ModelView::new(&entities, &relationships));

    assert!(!report.valid);
    assert_eq!(report.errors.len(), 5, "{:#?}", report.errors);
    assert_eq!(
        report.errors.iter().filter(|v| v.rule == Rule::IdentifierFormat).count(),
        3
    );
    assert!(report.has_rule(Rule::Range));
    assert!(report.has_rule(Rule::UnknownReference));
    Ok(())
}

#[test]
fn test_every_data_type_maps_to_something() -> Result<()> {
    let mut types: Vec<FieldDataType> = FieldDataType::known().to_vec();
    types.push(FieldDataType::Other("GEOMETRY".into()));
    for data_type in types {
        let known = data_type.is_known();
        let field = Field::new("User", "value", data_type, 1)?;
        let mapping = map_field(&field);
        assert!(!mapping.storage.is_empty());
        assert!(!mapping.host.is_empty());
        assert!(!mapping.presentation.form_widget.is_empty());
        assert_eq!(mapping.fallback, !known);
    }
    Ok(())
}

#[tokio::test]
async fn test_failed_file_does_not_disturb_its_siblings() -> Result<()> {
    let out = tempfile::tempdir()?;
    // A non-empty directory where a file should go cannot be replaced
    let blocked = out.path().join("src/blocked.ts");
    std::fs::create_dir_all(&blocked)?;
    std::fs::write(blocked.join("keep"), "x")?;

    let files = vec![
        PendingFile {
            path: "src/a.ts".into(),
            content: "a".into(),
        },
        PendingFile {
            path: "src/blocked.ts".into(),
            content: "blocked".into(),
        },
        PendingFile {
            path: "../escape.ts".into(),
            content: "escape".into(),
        },
        PendingFile {
            path: "src/nested/b.ts".into(),
            content: "b".into(),
        },
    ];
    let options = WriteOptions {
        overwrite_existing: true,
        ..Default::default()
    };
    let result = materialize(files, out.path(), options).await;

    let written: HashSet<String> = result
        .written
        .iter()
        .map(|f| f.path.display().to_string())
        .collect();
    let failed: HashSet<String> = result
        .failed
        .iter()
        .map(|f| f.path.display().to_string())
        .collect();
    assert_eq!(written, HashSet::from(["src/a.ts".to_string(), "src/nested/b.ts".to_string()]));
    assert_eq!(failed, HashSet::from(["src/blocked.ts".to_string(), "../escape.ts".to_string()]));

    assert_eq!(std::fs::read_to_string(out.path().join("src/a.ts"))?, "a");
    assert_eq!(std::fs::read_to_string(out.path().join("src/nested/b.ts"))?, "b");
    assert!(blocked.join("keep").exists());
    assert!(!out.path().join("../escape.ts").exists());
    Ok(())
}

fn chain() -> Result<(Vec<Entity>, Vec<Relationship>)> {
    let mut entities = Vec::new();
    for code in ["User", "Order", "Invoice"] {
        let mut entity = Entity::new("shop", code, code)?;
        entity.ensure_common_fields();
        entity.add_field(Field::new(code, "label", FieldDataType::String, 6)?);
        entities.push(entity);
    }
    let link = |id: &str, source: &str, target: &str| Relationship {
        id: id.into(),
        project_id: "shop".into(),
        name: id.into(),
        code: id.into(),
        relationship_type: RelationshipType::OneToMany,
        source_entity_id: source.into(),
        target_entity_id: target.into(),
        source_field_id: None,
        target_field_id: None,
        foreign_key_name: None,
        on_delete: ReferentialAction::Restrict,
        on_update: ReferentialAction::Restrict,
        config: None,
    };
    let relationships = vec![
        link("userOrders", "User", "Order"),
        link("orderInvoices", "Order", "Invoice"),
    ];
    Ok((entities, relationships))
}

fn select_labels(codes: &[&str]) -> Vec<SelectField> {
    codes
        .iter()
        .map(|code| SelectField {
            entity_id: code.to_string(),
            field_id: "label".into(),
            alias: None,
            aggregation: None,
        })
        .collect()
}

fn join(relationship_id: &str) -> JoinSpec {
    JoinSpec {
        relationship_id: relationship_id.into(),
        join_type: Default::default(),
        alias: None,
    }
}

#[test]
fn test_unreachable_entity_always_fails_and_names_it() -> Result<()> {
    let (entities, relationships) = chain()?;
    let view = ModelView::new(&entities, &relationships);

    let spec = JoinQuerySpec {
        base_entity_id: "User".into(),
        joins: vec![join("userOrders")],
        select_fields: select_labels(&["User", "Invoice"]),
        ..Default::default()
    };
    let report = validate_join_query(&spec, &view, EmptyProjectionPolicy::Warn);
    assert!(!report.valid);
    assert!(report
        .errors
        .iter()
        .any(|v| v.rule == Rule::Unreachable && v.message.contains("'Invoice'")));
    Ok(())
}

#[test]
fn test_fully_reachable_spec_validates() -> Result<()> {
    let (entities, relationships) = chain()?;
    let view = ModelView::new(&entities, &relationships);

    let spec = JoinQuerySpec {
        base_entity_id: "User".into(),
        joins: vec![join("userOrders"), join("orderInvoices")],
        select_fields: select_labels(&["User", "Order", "Invoice"]),
        ..Default::default()
    };
    let report = validate_join_query(&spec, &view, EmptyProjectionPolicy::Warn);
    assert!(report.valid, "{:?}", report.errors);
    Ok(())
}
