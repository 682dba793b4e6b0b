//! Code generation service
//!
//! The facade callers drive: it loads the metamodel subgraph a request needs
//! from the repository, validates it, renders every (template, entity) pair
//! on the blocking pool, materialises the results and records the outcome on
//! a generation task.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::errors::{GenerationError, GenerationResult, QueryResult, RepositoryError, TemplateError};
use crate::materialize::{resolve_path, ArtifactKind, MaterializationResult, Materializer, PendingFile, WriteOptions};
use crate::metamodel::{
    Entity, GenerationTask, JoinQuerySpec, LogLevel, ModelView, Relationship, TaskConfig,
    TaskSettings, TaskSummary, TaskType, Template,
};
use crate::naming::NameSet;
use crate::options::GenerationOptions;
use crate::query::{self, QueryArtifacts};
use crate::render::{self, builtin_template, RenderContext};
use crate::repository::MetamodelRepository;
use crate::task::{
    DefaultProgressReporter, ProgressReporter, TaskHandle, TaskRegistry, TaskStatusReport, CANCELLED_MESSAGE,
    DEFAULT_TASK_RETENTION_SECS,
};
use crate::type_mapping::file_extension;
use crate::validation::{self, Violation};

/// Templates rendered when a request names none
pub const DEFAULT_TEMPLATES: [&str; 5] = ["entity", "dto", "service", "controller", "module"];

#[derive(Debug, Clone, Default)]
pub struct CodeGenerationRequest {
    /// Task name; defaults to one derived from the entity ids
    pub name: Option<String>,
    pub entity_ids: Vec<String>,
    /// Template ids or codes; empty means [`DEFAULT_TEMPLATES`]
    pub template_ids: Vec<String>,
    pub output_path: Option<PathBuf>,
    pub variables: Map<String, Value>,
    pub options: GenerationOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityValidation {
    pub valid: bool,
    /// Ids of the entities that were checked
    pub entities: Vec<String>,
    pub errors: Vec<Violation>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedFile {
    pub name: String,
    pub path: PathBuf,
    pub content: String,
    pub size: usize,
    pub lines: usize,
    pub language: String,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub entity: String,
    pub template: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationStats {
    pub total_files: usize,
    pub total_lines: usize,
    pub total_size: usize,
}

/// One thing that went wrong for a template, an entity, or a pair of them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationIssue {
    pub template: Option<String>,
    pub entity: Option<String>,
    pub message: String,
}

impl From<&TemplateError> for GenerationIssue {
    fn from(error: &TemplateError) -> Self {
        let entity = match error {
            TemplateError::Render { entity, .. } => Some(entity.clone()),
            _ => None,
        };
        GenerationIssue {
            template: Some(error.template().to_string()),
            entity,
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeGenerationResult {
    pub task_id: String,
    pub success: bool,
    pub files: Vec<GeneratedFile>,
    pub stats: GenerationStats,
    pub errors: Vec<GenerationIssue>,
    pub warnings: Vec<String>,
    /// Absent on dry runs
    pub materialization: Option<MaterializationResult>,
    pub cancelled: bool,
    pub generated_at: DateTime<Utc>,
}

/// Entities and relationships one request touches
struct ModelSlice {
    entities: Vec<Entity>,
    relationships: Vec<Relationship>,
}

pub struct CodeGenerationService {
    repository: Arc<dyn MetamodelRepository>,
    tasks: TaskRegistry,
    task_retention: chrono::Duration,
}

impl CodeGenerationService {
    pub fn new(repository: Arc<dyn MetamodelRepository>) -> Self {
        Self::with_progress_reporter(repository, Arc::new(DefaultProgressReporter))
    }

    pub fn with_progress_reporter(
        repository: Arc<dyn MetamodelRepository>,
        progress_reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        CodeGenerationService {
            repository,
            tasks: TaskRegistry::new(progress_reporter),
            task_retention: chrono::Duration::seconds(DEFAULT_TASK_RETENTION_SECS),
        }
    }

    /// How long finished tasks stay queryable before the next run drops them
    pub fn with_task_retention(mut self, retention: chrono::Duration) -> Self {
        self.task_retention = retention;
        self
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    /// Loads the requested entities, every entity of their projects, and
    /// every relationship touching them. Unknown ids are left for the
    /// validator to report.
    async fn load_slice(&self, entity_ids: &[String]) -> Result<ModelSlice, RepositoryError> {
        let mut entities: Vec<Entity> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut projects: Vec<String> = Vec::new();

        for id in entity_ids {
            match self.repository.get_entity(id).await {
                Ok(entity) => {
                    if !projects.contains(&entity.project_id) {
                        projects.push(entity.project_id.clone());
                    }
                    if seen.insert(entity.id.clone()) {
                        entities.push(entity);
                    }
                }
                Err(e) if e.is_not_found() => debug!("Entity '{}' not in repository", id),
                Err(e) => return Err(e),
            }
        }
        for project in &projects {
            for entity in self.repository.list_entities_by_project(project).await? {
                if seen.insert(entity.id.clone()) {
                    entities.push(entity);
                }
            }
        }

        let mut relationships: Vec<Relationship> = Vec::new();
        let mut seen_relationships: HashSet<String> = HashSet::new();
        for entity in &entities {
            for relationship in self.repository.get_relationships_for_entity(&entity.id).await? {
                if seen_relationships.insert(relationship.id.clone()) {
                    relationships.push(relationship);
                }
            }
        }

        Ok(ModelSlice {
            entities,
            relationships,
        })
    }

    pub async fn validate_entities(&self, entity_ids: &[String]) -> GenerationResult<EntityValidation> {
        if entity_ids.is_empty() {
            return Err(GenerationError::EmptyRequest("entity_ids".to_string()));
        }
        let slice = self.load_slice(entity_ids).await?;
        let view = ModelView::new(&slice.entities, &slice.relationships);
        let report = validation::validate_entities(&view, entity_ids);
        info!(
            "Validated {} entities: {} violation(s)",
            entity_ids.len(),
            report.errors.len()
        );
        Ok(EntityValidation {
            valid: report.valid,
            entities: entity_ids.to_vec(),
            errors: report.errors,
            warnings: report.warnings,
        })
    }

    /// Repository template by id or code, else a built-in one
    async fn resolve_template(&self, id_or_code: &str) -> GenerationResult<Result<Template, TemplateError>> {
        match self.repository.get_template(id_or_code).await {
            Ok(template) => Ok(Ok(template)),
            Err(e) if e.is_not_found() => Ok(builtin_template(id_or_code)
                .map(|t| {
                    debug!("Using built-in template '{}' for '{}'", t.code, id_or_code);
                    t
                })
                .ok_or_else(|| TemplateError::NotFound(id_or_code.to_string()))),
            Err(e) => Err(e.into()),
        }
    }

    fn requested_templates(request: &CodeGenerationRequest) -> Vec<String> {
        let mut codes: Vec<String> = if request.template_ids.is_empty() {
            DEFAULT_TEMPLATES.iter().map(|c| c.to_string()).collect()
        } else {
            request.template_ids.clone()
        };
        if request.options.generate_tests && !codes.iter().any(|c| c == "test") {
            codes.push("test".to_string());
        }
        if request.options.generate_docs && !codes.iter().any(|c| c == "readme") {
            codes.push("readme".to_string());
        }
        codes
    }

    fn task_type(request: &CodeGenerationRequest, templates: usize) -> TaskType {
        if request.entity_ids.len() > 1 {
            TaskType::FullProject
        } else if templates > 1 {
            TaskType::Api
        } else {
            TaskType::Entity
        }
    }

    pub async fn generate_code(&self, request: CodeGenerationRequest) -> GenerationResult<CodeGenerationResult> {
        if request.entity_ids.is_empty() {
            return Err(GenerationError::EmptyRequest("entity_ids".to_string()));
        }
        if !request.options.dry_run && request.output_path.is_none() {
            return Err(GenerationError::MissingOutputDirectory);
        }
        let pruned = self.tasks.prune_finished(self.task_retention).await;
        if pruned > 0 {
            debug!("Dropped {} finished task(s)", pruned);
        }
        let options = request.options.clone();
        let template_codes = Self::requested_templates(&request);

        let slice = self.load_slice(&request.entity_ids).await?;
        let project_id = slice
            .entities
            .first()
            .map(|e| e.project_id.clone())
            .unwrap_or_default();
        let task = GenerationTask::new(
            if project_id.is_empty() { "default".to_string() } else { project_id },
            request
                .name
                .clone()
                .unwrap_or_else(|| format!("Generate {}", request.entity_ids.join(", "))),
            Self::task_type(&request, template_codes.len()),
            TaskConfig::Known(TaskSettings {
                entity_ids: request.entity_ids.clone(),
                template_ids: template_codes.clone(),
                output_path: request.output_path.as_ref().map(|p| p.display().to_string()),
                options: options.clone(),
            }),
        )?;
        let handle = self.tasks.register(task).await;
        handle.start().await?;

        match self.run_task(&handle, &request, &slice, &template_codes).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!("Generation task {} aborted: {}", handle.id(), e);
                if let Err(fail_error) = handle.fail(e.to_string()).await {
                    warn!("Could not mark task {} failed: {}", handle.id(), fail_error);
                }
                Err(e)
            }
        }
    }

    /// Everything after the task started; an `Err` leaves the task to the caller to fail
    async fn run_task(
        &self,
        handle: &TaskHandle,
        request: &CodeGenerationRequest,
        slice: &ModelSlice,
        template_codes: &[String],
    ) -> GenerationResult<CodeGenerationResult> {
        let options = &request.options;

        let mut errors: Vec<GenerationIssue> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();

        let mut templates: Vec<Arc<Template>> = Vec::new();
        for code in template_codes {
            match self.resolve_template(code).await? {
                Ok(template) => templates.push(Arc::new(template)),
                Err(e) => {
                    handle.log(LogLevel::Error, e.to_string()).await;
                    errors.push(GenerationIssue::from(&e));
                }
            }
        }

        let contexts = {
            let view = ModelView::new(&slice.entities, &slice.relationships);
            let mut contexts: Vec<Arc<RenderContext>> = Vec::new();
            for id in &request.entity_ids {
                let report = validation::validate_entities(&view, std::slice::from_ref(id));
                warnings.extend(report.warnings);
                if !report.valid {
                    handle
                        .log(LogLevel::Error, format!("Entity '{}' failed validation", id))
                        .await;
                    errors.extend(report.errors.into_iter().map(|v| GenerationIssue {
                        template: None,
                        entity: Some(id.clone()),
                        message: v.to_string(),
                    }));
                    continue;
                }
                if let Some(entity) = view.entity(id) {
                    let context = RenderContext::for_entity(entity, &view, options, &request.variables);
                    warnings.extend(context.warnings.iter().cloned());
                    contexts.push(Arc::new(context));
                }
            }
            contexts
        };

        let (files, render_errors, cancelled) =
            self.render_units(handle, &templates, &contexts, options, &mut warnings).await?;
        errors.extend(render_errors);

        let cancelled = cancelled || handle.is_cancelled();
        let materialization = match (&request.output_path, options.dry_run, cancelled) {
            (Some(root), false, false) => {
                let pending: Vec<PendingFile> = files
                    .iter()
                    .map(|f| PendingFile {
                        path: f.path.clone(),
                        content: f.content.clone(),
                    })
                    .collect();
                let result = Materializer::new(root.clone(), WriteOptions::from(options))
                    .materialize(pending)
                    .await;
                for failed in &result.failed {
                    handle
                        .log(LogLevel::Error, format!("Failed to write {}: {}", failed.path.display(), failed.error))
                        .await;
                }
                Some(result)
            }
            _ => None,
        };
        // A cancel that lands while files are written still fails the task
        let cancelled = cancelled || handle.is_cancelled();
        if cancelled {
            warn!("Generation task {} cancelled", handle.id());
        }

        let stats = GenerationStats {
            total_files: files.len(),
            total_lines: files.iter().map(|f| f.lines).sum(),
            total_size: files.iter().map(|f| f.size).sum(),
        };
        let success = !cancelled
            && errors.is_empty()
            && materialization.as_ref().map_or(true, |m| m.is_complete());

        let summary = TaskSummary {
            total_files: stats.total_files,
            total_lines: stats.total_lines,
            total_size: stats.total_size,
            written: materialization.as_ref().map_or(0, |m| m.written.len()),
            skipped: materialization.as_ref().map_or(0, |m| m.skipped.len()),
            failed: materialization.as_ref().map_or(0, |m| m.failed.len()),
            errors: errors.len(),
        };
        if cancelled {
            handle.fail(CANCELLED_MESSAGE).await?;
        } else if files.is_empty() && !errors.is_empty() {
            handle
                .fail(format!("No files generated, {} error(s)", errors.len()))
                .await?;
        } else {
            handle
                .complete(summary, request.output_path.as_ref().map(|p| p.display().to_string()))
                .await?;
        }

        info!(
            "Generation task {} produced {} file(s), {} error(s), {} warning(s)",
            handle.id(),
            files.len(),
            errors.len(),
            warnings.len()
        );

        Ok(CodeGenerationResult {
            task_id: handle.id().to_string(),
            success,
            files,
            stats,
            errors,
            warnings,
            materialization,
            cancelled,
            generated_at: Utc::now(),
        })
    }

    /// Renders every pair on the blocking pool. Returns the files in request
    /// order, the per-pair errors, and whether the task was cancelled.
    async fn render_units(
        &self,
        handle: &TaskHandle,
        templates: &[Arc<Template>],
        contexts: &[Arc<RenderContext>],
        options: &GenerationOptions,
        warnings: &mut Vec<String>,
    ) -> GenerationResult<(Vec<GeneratedFile>, Vec<GenerationIssue>, bool)> {
        let total = templates.len() * contexts.len();
        let mut set = JoinSet::new();
        let mut cancelled = false;

        'schedule: for (entity_index, context) in contexts.iter().enumerate() {
            for (template_index, template) in templates.iter().enumerate() {
                if handle.is_cancelled() {
                    cancelled = true;
                    break 'schedule;
                }
                let template = Arc::clone(template);
                let context = Arc::clone(context);
                set.spawn_blocking(move || {
                    let result = render::render(&template, &context);
                    ((entity_index, template_index), result)
                });
            }
        }

        let mut rendered: HashMap<(usize, usize), String> = HashMap::new();
        let mut errors = Vec::new();
        let mut done = 0usize;
        while let Some(joined) = set.join_next().await {
            if handle.is_cancelled() {
                cancelled = true;
                set.abort_all();
                break;
            }
            let ((entity_index, template_index), result) =
                joined.map_err(|e| GenerationError::Worker(e.to_string()))?;
            done += 1;
            match result {
                Ok(content) => {
                    rendered.insert((entity_index, template_index), content);
                }
                Err(e) => {
                    handle.log(LogLevel::Error, e.to_string()).await;
                    errors.push(((entity_index, template_index), GenerationIssue::from(&e)));
                }
            }
            if total > 0 {
                let progress = (done * 90 / total) as i64;
                handle
                    .update_progress(progress, format!("Rendered {}/{}", done, total))
                    .await?;
            }
        }
        cancelled = cancelled || handle.is_cancelled();
        errors.sort_by_key(|(key, _)| *key);

        let mut files = Vec::new();
        let mut paths: HashSet<PathBuf> = HashSet::new();
        for (entity_index, context) in contexts.iter().enumerate() {
            for (template_index, template) in templates.iter().enumerate() {
                let Some(content) = rendered.remove(&(entity_index, template_index)) else {
                    continue;
                };
                let kind = ArtifactKind::for_template(&template.category, &template.code);
                let names = NameSet::of(&context.entity_code);
                let path = resolve_path(kind, &names, options.architecture, file_extension(&template.language));
                if !paths.insert(path.clone()) {
                    let message = format!(
                        "Template '{}' for entity '{}' resolves to {} which is already generated, output dropped",
                        template.code,
                        context.entity_code,
                        path.display()
                    );
                    warn!("{}", message);
                    warnings.push(message);
                    continue;
                }
                files.push(GeneratedFile {
                    name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default(),
                    size: content.len(),
                    lines: content.lines().count(),
                    language: template.language.clone(),
                    kind,
                    entity: context.entity_code.clone(),
                    template: template.code.clone(),
                    path,
                    content,
                });
            }
        }

        Ok((files, errors.into_iter().map(|(_, issue)| issue).collect(), cancelled))
    }

    /// Loads the base entity's project and synthesises the query against it
    pub async fn synthesize_join_query(
        &self,
        spec: &JoinQuerySpec,
        options: &GenerationOptions,
    ) -> QueryResult<QueryArtifacts> {
        let slice = self.load_slice(std::slice::from_ref(&spec.base_entity_id)).await?;
        let view = ModelView::new(&slice.entities, &slice.relationships);
        query::synthesize(spec, &view, options)
    }

    pub async fn get_task_status(&self, task_id: &str) -> GenerationResult<TaskStatusReport> {
        Ok(self.tasks.status(task_id).await?)
    }

    /// Stops scheduling new render units for a running task
    pub async fn cancel_task(&self, task_id: &str) -> GenerationResult<()> {
        let handle = self.tasks.get(task_id).await?;
        handle.cancel();
        handle.log(LogLevel::Warning, "Cancellation requested").await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metamodel::{Field, FieldDataType, TaskStatus};
    use crate::options::Architecture;
    use crate::repository::{InMemoryRepository, MetamodelSnapshot};
    use crate::repository::TemplateFilter;
    use crate::task::progress::recording::RecordingReporter;
    use async_trait::async_trait;
    use std::sync::OnceLock;

    fn user() -> Entity {
        let mut user = Entity::new("p1", "User", "User").expect("entity");
        user.ensure_common_fields();
        user.add_field(
            Field::new("User", "email", FieldDataType::String, 6)
                .expect("field")
                .required(),
        );
        user
    }

    fn service(entities: Vec<Entity>, templates: Vec<Template>) -> CodeGenerationService {
        let repository = InMemoryRepository::new(MetamodelSnapshot {
            project_id: "p1".into(),
            entities,
            relationships: Vec::new(),
            templates,
        });
        CodeGenerationService::with_progress_reporter(
            Arc::new(repository),
            Arc::new(RecordingReporter::default()),
        )
    }

    fn dry(template_ids: &[&str]) -> CodeGenerationRequest {
        CodeGenerationRequest {
            entity_ids: vec!["User".into()],
            template_ids: template_ids.iter().map(|s| s.to_string()).collect(),
            options: GenerationOptions {
                dry_run: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_contract_errors_are_returned_before_work() {
        let service = service(vec![user()], Vec::new());
        let err = service
            .generate_code(CodeGenerationRequest::default())
            .await
            .expect_err("empty ids");
        assert_eq!(err, GenerationError::EmptyRequest("entity_ids".into()));

        let mut request = dry(&["controller"]);
        request.options.dry_run = false;
        assert_eq!(
            service.generate_code(request).await,
            Err(GenerationError::MissingOutputDirectory)
        );
        assert!(service.tasks().task_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_returns_default_set_without_writing() {
        let service = service(vec![user()], Vec::new());
        let result = service.generate_code(dry(&[])).await.expect("generated");
        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.files.len(), DEFAULT_TEMPLATES.len());
        assert!(result.materialization.is_none());
        assert_eq!(result.stats.total_files, 5);
        assert_eq!(
            result.stats.total_size,
            result.files.iter().map(|f| f.content.len()).sum::<usize>()
        );

        let status = service.get_task_status(&result.task_id).await.expect("status");
        assert_eq!(status.status, TaskStatus::Completed);
        assert_eq!(status.percentage, 100);
    }

    #[tokio::test]
    async fn test_template_errors_are_isolated_per_pair() {
        let broken = Template::new("p1", "Broken", "broken", "typescript", "{{#each fields}}x{{/if}}")
            .expect("braces balance");
        let service = service(vec![user()], vec![broken]);
        let result = service
            .generate_code(dry(&["broken", "missing", "service"]))
            .await
            .expect("generated");
        assert!(!result.success);
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].kind, ArtifactKind::Service);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors[0].template.as_deref(), Some("missing"));
        assert_eq!(result.errors[1].template.as_deref(), Some("broken"));
    }

    #[tokio::test]
    async fn test_invalid_entity_is_reported_not_rendered() {
        let mut bad = user();
        bad.add_field(Field::new("User", "id", FieldDataType::String, 9).expect("field"));
        let service = service(vec![bad], Vec::new());
        let result = service.generate_code(dry(&["entity"])).await.expect("generated");
        assert!(result.files.is_empty());
        assert!(result
            .errors
            .iter()
            .any(|e| e.message.contains("field code 'id' conflicts with system common field")));
        assert!(result.errors.iter().all(|e| e.entity.as_deref() == Some("User")));

        let status = service.get_task_status(&result.task_id).await.expect("status");
        assert_eq!(status.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_generate_tests_and_docs_add_builtins() {
        let service = service(vec![user()], Vec::new());
        let mut request = dry(&["entity"]);
        request.options.generate_tests = true;
        request.options.generate_docs = true;
        request.options.architecture = Architecture::Layered;
        let result = service.generate_code(request).await.expect("generated");
        let paths: Vec<String> = result.files.iter().map(|f| f.path.display().to_string()).collect();
        assert_eq!(
            paths,
            vec![
                "src/base/entities/user.base.entity.ts",
                "test/user.spec.ts",
                "docs/user.md",
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_task_status() {
        let service = service(vec![user()], Vec::new());
        let err = service.get_task_status("nope").await.expect_err("unknown");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_validate_entities_reports_unknown_ids() {
        let service = service(vec![user()], Vec::new());
        let report = service
            .validate_entities(&["User".into(), "Ghost".into()])
            .await
            .expect("validated");
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.entities.len(), 2);
    }

    /// Cancels the task it reports on as soon as rendering makes progress
    #[derive(Default)]
    struct CancelOnProgress {
        registry: OnceLock<TaskRegistry>,
    }

    #[async_trait]
    impl ProgressReporter for CancelOnProgress {
        async fn report_progress(&self, task_id: &str, progress: u8, _message: &str) {
            if progress == 0 {
                return;
            }
            if let Some(registry) = self.registry.get() {
                if let Ok(handle) = registry.get(task_id).await {
                    handle.cancel();
                }
            }
        }

        async fn report_log(&self, _task_id: &str, _level: LogLevel, _message: &str) {}

        async fn report_error(&self, _task_id: &str, _error: &str) {}

        async fn report_completion(&self, _task_id: &str, _success: bool) {}
    }

    #[tokio::test]
    async fn test_cancel_during_rendering_writes_nothing() {
        let out = tempfile::tempdir().expect("tempdir");
        let repository = InMemoryRepository::new(MetamodelSnapshot {
            project_id: "p1".into(),
            entities: vec![user()],
            ..Default::default()
        });
        let reporter = Arc::new(CancelOnProgress::default());
        let service = CodeGenerationService::with_progress_reporter(Arc::new(repository), reporter.clone());
        assert!(reporter.registry.set(service.tasks().clone()).is_ok());

        let request = CodeGenerationRequest {
            entity_ids: vec!["User".into()],
            output_path: Some(out.path().to_path_buf()),
            ..Default::default()
        };
        let result = service.generate_code(request).await.expect("generated");

        assert!(result.cancelled);
        assert!(!result.success);
        assert!(result.materialization.is_none());
        let on_disk = std::fs::read_dir(out.path()).expect("read dir").count();
        assert_eq!(on_disk, 0);

        let status = service.get_task_status(&result.task_id).await.expect("status");
        assert_eq!(status.status, TaskStatus::Failed);
        assert_eq!(status.message, CANCELLED_MESSAGE);
    }

    /// Serves entities but fails every template lookup
    struct TemplateOutage(InMemoryRepository);

    #[async_trait]
    impl MetamodelRepository for TemplateOutage {
        async fn get_entity(&self, id: &str) -> Result<Entity, RepositoryError> {
            self.0.get_entity(id).await
        }

        async fn list_entities_by_project(&self, project_id: &str) -> Result<Vec<Entity>, RepositoryError> {
            self.0.list_entities_by_project(project_id).await
        }

        async fn get_relationships_for_entity(&self, entity_id: &str) -> Result<Vec<Relationship>, RepositoryError> {
            self.0.get_relationships_for_entity(entity_id).await
        }

        async fn get_template(&self, _id_or_code: &str) -> Result<Template, RepositoryError> {
            Err(RepositoryError::Backend("template store down".into()))
        }

        async fn list_templates(&self, filter: &TemplateFilter) -> Result<Vec<Template>, RepositoryError> {
            self.0.list_templates(filter).await
        }
    }

    #[tokio::test]
    async fn test_backend_error_after_start_fails_the_task() {
        let repository = TemplateOutage(InMemoryRepository::new(MetamodelSnapshot {
            project_id: "p1".into(),
            entities: vec![user()],
            ..Default::default()
        }));
        let service = CodeGenerationService::with_progress_reporter(
            Arc::new(repository),
            Arc::new(RecordingReporter::default()),
        );

        let err = service.generate_code(dry(&["entity"])).await.expect_err("backend down");
        assert_eq!(
            err,
            GenerationError::Repository(RepositoryError::Backend("template store down".into()))
        );

        let ids = service.tasks().task_ids().await;
        assert_eq!(ids.len(), 1);
        let status = service.get_task_status(&ids[0]).await.expect("status");
        assert_eq!(status.status, TaskStatus::Failed);
        assert!(status.message.contains("template store down"), "{}", status.message);
    }

    #[tokio::test]
    async fn test_finished_tasks_are_dropped_after_retention() {
        let service = service(vec![user()], Vec::new()).with_task_retention(chrono::Duration::zero());
        let first = service.generate_code(dry(&["entity"])).await.expect("first");
        let second = service.generate_code(dry(&["entity"])).await.expect("second");

        assert_eq!(service.tasks().task_ids().await, vec![second.task_id.clone()]);
        assert!(service.get_task_status(&first.task_id).await.is_err());
    }
}
