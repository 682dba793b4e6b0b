use anyhow::{anyhow, Context, Result};
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::errors::QueryError;
use crate::materialize::{Materializer, WriteOptions};
use crate::plan::{GenerationProfile, JoinQueryProfile, Plan};
use crate::repository::{InMemoryRepository, MetamodelRepository};
use crate::service::{CodeGenerationRequest, CodeGenerationService};

fn plan_dir(plan_file_path: &Path) -> Result<PathBuf> {
    plan_file_path
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("Plan file has no parent directory"))
}

async fn run_generation(
    service: &CodeGenerationService,
    repository: &InMemoryRepository,
    profile: &GenerationProfile,
    base_dir: &Path,
) -> Result<()> {
    let entity_ids = if profile.entities.is_empty() {
        repository
            .snapshot()
            .await
            .entities
            .iter()
            .map(|e| e.id.clone())
            .collect()
    } else {
        profile.entities.clone()
    };

    let request = CodeGenerationRequest {
        name: None,
        entity_ids,
        template_ids: profile.templates.clone(),
        output_path: Some(base_dir.join(&profile.output)),
        variables: profile.variables.clone(),
        options: profile.options.clone(),
    };
    let result = service.generate_code(request).await?;

    result.warnings.iter().for_each(|w| warn!("{}", w));
    result.errors.iter().for_each(|e| error!("{}", e.message));
    if let Some(materialization) = &result.materialization {
        info!(
            "Generated {} file(s): {} written, {} skipped, {} failed",
            result.stats.total_files,
            materialization.written.len(),
            materialization.skipped.len(),
            materialization.failed.len()
        );
        materialization
            .skipped
            .iter()
            .for_each(|s| info!("Skipped {}: {}", s.path.display(), s.reason));
    } else {
        for file in &result.files {
            info!("Would write {} ({} bytes)", file.path.display(), file.size);
        }
    }
    Ok(())
}

async fn run_join_query(
    service: &CodeGenerationService,
    profile: &JoinQueryProfile,
    write_options: WriteOptions,
    options: &crate::options::GenerationOptions,
    base_dir: &Path,
) -> Result<()> {
    let name = profile
        .spec
        .name
        .clone()
        .unwrap_or_else(|| format!("{} join", profile.spec.base_entity_id));
    info!("Synthesizing join query: {}", name);

    let artifacts = match service.synthesize_join_query(&profile.spec, options).await {
        Ok(artifacts) => artifacts,
        Err(QueryError::Invalid(report)) => {
            warn!("Join query '{}' is invalid", name);
            report.errors.iter().for_each(|v| warn!("{}", v));
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    artifacts.warnings.iter().for_each(|w| warn!("{}", w));

    match &profile.output {
        Some(output) => {
            let root = base_dir.join(output);
            let result = Materializer::new(root, write_options)
                .materialize(artifacts.pending_files(&profile.spec.base_entity_id))
                .await;
            result
                .failed
                .iter()
                .for_each(|f| error!("Failed to write {}: {}", f.path.display(), f.error));
            info!(
                "Join query '{}': {} file(s) written, {} skipped",
                name,
                result.written.len(),
                result.skipped.len()
            );
        }
        None => info!("Join query '{}':\n{}", name, artifacts.sql),
    }
    Ok(())
}

/// Runs every profile of the plan once
async fn run_plan(plan: &Plan, plan_file_path: &Path) -> Result<()> {
    let base_dir = plan_dir(plan_file_path)?;
    let model_path = base_dir.join(&plan.model);
    let repository = InMemoryRepository::from_yaml_file(&model_path)?;
    let service = CodeGenerationService::new(Arc::new(repository.clone()) as Arc<dyn MetamodelRepository>);

    let options = plan
        .generation
        .as_ref()
        .map(|g| g.options.clone())
        .unwrap_or_default();

    if let Some(profile) = &plan.generation {
        run_generation(&service, &repository, profile, &base_dir).await?;
    }
    for profile in &plan.join_queries {
        run_join_query(&service, profile, WriteOptions::from(&options), &options, &base_dir).await?;
    }
    Ok(())
}

fn load_plan(plan_file_path: &Path) -> Result<Plan> {
    let path_content = std::fs::read_to_string(plan_file_path)
        .with_context(|| format!("Failed to read plan {}", plan_file_path.display()))?;
    let parsed: Plan = serde_yaml::from_str(&path_content)?;
    Ok(parsed)
}

/// Main function to execute a plan, with optional file watching
pub async fn execute_plan(plan: String, watch: bool) -> Result<()> {
    info!("Executing plan {}", plan);

    let plan_file_path = Path::new(&plan);
    let parsed = load_plan(plan_file_path)?;

    debug!("Executing plan: {:?}", parsed);
    run_plan(&parsed, plan_file_path).await?;

    if watch {
        watch_for_changes(parsed, plan_file_path).await?;
    }

    Ok(())
}

/// Re-runs the plan whenever the plan or its model file changes
async fn watch_for_changes(mut plan: Plan, plan_file_path: &Path) -> Result<()> {
    info!("Watching for changes");

    let (tx, mut rx) = tokio::sync::mpsc::channel(16);
    let mut watcher = RecommendedWatcher::new(
        move |event| {
            let _ = tx.blocking_send(event);
        },
        Config::default(),
    )?;
    let mut model_path = plan_dir(plan_file_path)?.join(&plan.model);
    watcher.watch(plan_file_path, RecursiveMode::NonRecursive)?;
    watcher.watch(&model_path, RecursiveMode::NonRecursive)?;

    while let Some(event) = rx.recv().await {
        match event {
            Ok(event) => {
                if let EventKind::Modify(_) = event.kind {
                    debug!("File modified {:?}", event.paths);
                    if event.paths.iter().any(|p| p.ends_with(plan_file_path)) {
                        match load_plan(plan_file_path) {
                            Ok(reloaded) => plan = reloaded,
                            Err(e) => {
                                error!("Failed to reload plan: {:#}", e);
                                continue;
                            }
                        }
                        let reloaded_model = plan_dir(plan_file_path)?.join(&plan.model);
                        if reloaded_model != model_path {
                            let _ = watcher.unwatch(&model_path);
                            watcher.watch(&reloaded_model, RecursiveMode::NonRecursive)?;
                            model_path = reloaded_model;
                        }
                    }
                    info!("Change detected, re-executing plan");
                    if let Err(e) = run_plan(&plan, plan_file_path).await {
                        error!("Plan execution failed: {:#}", e);
                    }
                }
            }
            Err(e) => error!("Watch error: {:?}", e),
        }
    }
    Ok(())
}
