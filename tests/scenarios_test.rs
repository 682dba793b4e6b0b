//! End-to-end scenarios through the service facade
//!
//! Generation, validation and join query synthesis against an in-memory
//! repository, writing into temporary directories.

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;

use modelforge::metamodel::{
    Entity, Field, FieldDataType, FilterOperator, FilterSpec, JoinQuerySpec, JoinSpec, JoinType,
    LogicalOperator, ReferentialAction, Relationship, RelationshipType, SelectField,
    SortDirection, SortSpec, TaskStatus,
};
use modelforge::materialize::{materialize, PendingFile, WriteOptions};
use modelforge::options::{Architecture, GenerationOptions};
use modelforge::repository::{InMemoryRepository, MetamodelSnapshot};
use modelforge::service::{CodeGenerationRequest, CodeGenerationService};
use modelforge::validation::Rule;

fn entity(id: &str, code: &str) -> Result<Entity> {
    let mut entity = Entity::new("shop", code, code)?;
    entity.id = id.to_string();
    entity.ensure_common_fields();
    Ok(entity)
}

fn shop() -> Result<(Vec<Entity>, Vec<Relationship>)> {
    let mut user = entity("User", "User")?;
    user.add_field(Field::new("User", "email", FieldDataType::String, 6)?.required());

    let mut order = entity("Order", "Order")?;
    order.add_field(Field::new("Order", "userId", FieldDataType::String, 6)?.required());
    order.add_field(Field::new("Order", "total", FieldDataType::Decimal, 7)?.with_precision(10, Some(2))?);

    let relationship = Relationship {
        id: "userOrders".into(),
        project_id: "shop".into(),
        name: "User orders".into(),
        code: "userOrders".into(),
        relationship_type: RelationshipType::OneToMany,
        source_entity_id: "User".into(),
        target_entity_id: "Order".into(),
        source_field_id: None,
        target_field_id: Some("Order-userId".into()),
        foreign_key_name: None,
        on_delete: ReferentialAction::Cascade,
        on_update: ReferentialAction::Restrict,
        config: None,
    };
    Ok((vec![user, order], vec![relationship]))
}

fn service(entities: Vec<Entity>, relationships: Vec<Relationship>) -> CodeGenerationService {
    let repository = InMemoryRepository::new(MetamodelSnapshot {
        project_id: "shop".into(),
        entities,
        relationships,
        templates: Vec::new(),
    });
    CodeGenerationService::new(Arc::new(repository))
}

#[tokio::test]
async fn test_layered_controller_for_single_entity() -> Result<()> {
    let mut user = entity("User-id", "User")?;
    user.add_field(Field::new("User-id", "email", FieldDataType::String, 6)?.required());
    let service = service(vec![user], Vec::new());
    let out = tempfile::tempdir()?;

    let result = service
        .generate_code(CodeGenerationRequest {
            entity_ids: vec!["User-id".into()],
            template_ids: vec!["controller-template".into()],
            output_path: Some(out.path().to_path_buf()),
            options: GenerationOptions {
                architecture: Architecture::Layered,
                ..Default::default()
            },
            ..Default::default()
        })
        .await?;

    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.files.len(), 1);
    let file = &result.files[0];
    assert_eq!(
        file.path.display().to_string(),
        "src/base/controllers/user.base.controller.ts"
    );
    assert!(file.content.contains("User"));
    assert_eq!(file.name, "user.base.controller.ts");

    let on_disk = std::fs::read_to_string(out.path().join(&file.path))?;
    assert_eq!(on_disk, file.content);
    let materialization = result.materialization.expect("written");
    assert_eq!(materialization.written.len(), 1);

    let status = service.get_task_status(&result.task_id).await?;
    assert_eq!(status.status, TaskStatus::Completed);
    assert_eq!(status.percentage, 100);
    Ok(())
}

fn big_orders() -> JoinQuerySpec {
    JoinQuerySpec {
        base_entity_id: "User".into(),
        joins: vec![JoinSpec {
            relationship_id: "userOrders".into(),
            join_type: JoinType::Inner,
            alias: None,
        }],
        select_fields: vec![
            SelectField {
                entity_id: "User".into(),
                field_id: "email".into(),
                alias: None,
                aggregation: None,
            },
            SelectField {
                entity_id: "Order".into(),
                field_id: "total".into(),
                alias: None,
                aggregation: None,
            },
        ],
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

#[tokio::test]
async fn test_one_to_many_join_query() -> Result<()> {
    let (entities, relationships) = shop()?;
    let service = service(entities, relationships);

    let artifacts = service
        .synthesize_join_query(&big_orders(), &GenerationOptions::default())
        .await?;

    assert_eq!(artifacts.sql.matches("JOIN").count(), 1);
    assert!(artifacts.sql.contains("WHERE \"order\".\"total\" > $1"));
    assert!(artifacts.sql.contains("ORDER BY \"user\".\"email\" ASC"));
    assert!(!artifacts.sql.contains("100"));
    assert_eq!(artifacts.parameters, vec![json!(100)]);

    assert_eq!(artifacts.orm_query["where"], json!({ "orders": { "some": { "total": { "gt": 100 } } } }));
    assert_eq!(artifacts.orm_query["include"]["orders"]["select"]["total"], json!(true));
    assert_eq!(artifacts.orm_query["orderBy"], json!([{ "email": "asc" }]));

    assert!(artifacts.type_declaration.contains("user_email: string;"));
    assert!(artifacts.type_declaration.contains("order_total: number;"));
    assert!(artifacts.api_stub.contains("api/v1/user-join"));
    Ok(())
}

#[tokio::test]
async fn test_unknown_base_entity_is_reported() -> Result<()> {
    let (entities, relationships) = shop()?;
    let service = service(entities, relationships);
    let mut spec = big_orders();
    spec.base_entity_id = "Ghost".into();

    let err = service
        .synthesize_join_query(&spec, &GenerationOptions::default())
        .await
        .expect_err("unknown base");
    let report = err.report().expect("validation report");
    assert!(report.has_rule(Rule::UnknownReference));
    Ok(())
}

#[tokio::test]
async fn test_reserved_business_field_code() -> Result<()> {
    let (mut entities, relationships) = shop()?;
    let user = &mut entities[0];
    let order = user.next_display_order();
    user.add_field(Field::new("User", "id", FieldDataType::String, order)?);
    let service = service(entities, relationships);

    let report = service.validate_entities(&["User".to_string()]).await?;
    assert!(!report.valid);
    // Shadowing a common field also repeats its code, and both are reported
    let rules: Vec<Rule> = report.errors.iter().map(|v| v.rule).collect();
    assert_eq!(rules, vec![Rule::Duplicate, Rule::ReservedName], "{:#?}", report.errors);
    assert_eq!(report.errors[0].message, "field code 'id' is already used by 'User-id'");
    assert_eq!(report.errors[1].message, "field code 'id' conflicts with system common field");
    assert!(report.errors.iter().all(|v| v.field == report.errors[0].field));
    Ok(())
}

#[tokio::test]
async fn test_existing_file_is_skipped_and_untouched() -> Result<()> {
    let out = tempfile::tempdir()?;
    let existing = out.path().join("src/controllers/user.controller.ts");
    std::fs::create_dir_all(existing.parent().expect("parent"))?;
    std::fs::write(&existing, "hand written")?;

    let result = materialize(
        vec![PendingFile {
            path: "src/controllers/user.controller.ts".into(),
            content: "generated".into(),
        }],
        out.path(),
        WriteOptions::default(),
    )
    .await;

    assert!(result.written.is_empty());
    assert!(result.failed.is_empty());
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(std::fs::read_to_string(&existing)?, "hand written");
    Ok(())
}

#[tokio::test]
async fn test_rerun_without_overwrite_skips_everything() -> Result<()> {
    let (entities, relationships) = shop()?;
    let service = service(entities, relationships);
    let out = tempfile::tempdir()?;
    let request = CodeGenerationRequest {
        entity_ids: vec!["User".into(), "Order".into()],
        output_path: Some(out.path().to_path_buf()),
        ..Default::default()
    };

    let first = service.generate_code(request.clone()).await?;
    assert!(first.success, "{:?}", first.errors);
    assert_eq!(first.files.len(), 10);

    let second = service.generate_code(request).await?;
    let materialization = second.materialization.expect("written");
    assert!(materialization.written.is_empty());
    assert_eq!(materialization.skipped.len(), 10);
    assert!(second.success);
    Ok(())
}
