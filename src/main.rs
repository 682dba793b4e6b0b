use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use modelforge::common;
use modelforge::errors::QueryError;
use modelforge::generate_commands;
use modelforge::materialize::{Materializer, WriteOptions};
use modelforge::metamodel::{JoinQuerySpec, ModelView};
use modelforge::options::GenerationOptions;
use modelforge::plan;
use modelforge::plan_execution;
use modelforge::repository::MetamodelSnapshot;
use modelforge::validation::{self, ValidationResult};

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Run {
        #[clap(short, long)]
        plan: String,
        #[clap(short, long)]
        watch: bool,
    },
    Init {
        #[clap(short, long)]
        plan: String,
    },
    /// Validate a model file, or only the named entities in it
    Validate {
        #[clap(short, long)]
        model: String,
        #[clap(short, long)]
        entity: Vec<String>,
    },
    /// Synthesize a join query spec against a model file
    Query {
        #[clap(short, long)]
        model: String,
        #[clap(short, long)]
        spec: String,
        #[clap(short, long)]
        output: Option<String>,
        #[clap(long)]
        overwrite: bool,
    },
    Generate {
        #[clap(subcommand)]
        command: GenerateCommands,
    },
}

#[derive(Subcommand, Debug)]
enum GenerateCommands {
    Template { name: String },
    Sample { dir: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    match args.command {
        Commands::Run { plan, watch } => {
            info!("Running plan: {}", plan);
            plan_execution::execute_plan(plan, watch).await?;
        }
        Commands::Init { plan } => {
            info!("Initializing plan: {}", plan);
            let plan_file_path = plan;
            let plan = plan::Plan::default();
            let serialized_plan = serde_yaml::to_string(&plan)?;
            common::write_string_to_file(&plan_file_path, &serialized_plan)?;
        }
        Commands::Validate { model, entity } => {
            let snapshot = MetamodelSnapshot::from_yaml_file(&model)?;
            let view = ModelView::new(&snapshot.entities, &snapshot.relationships);
            let report = if entity.is_empty() {
                validation::validate_model(&view)
            } else {
                validation::validate_entities(&view, &entity)
            };
            print_report(&report);
            if !report.valid {
                bail!("{} violation(s) in {}", report.errors.len(), model);
            }
        }
        Commands::Query {
            model,
            spec,
            output,
            overwrite,
        } => {
            let snapshot = MetamodelSnapshot::from_yaml_file(&model)?;
            let spec_content = std::fs::read_to_string(&spec)
                .with_context(|| format!("Failed to read join query {}", spec))?;
            let spec: JoinQuerySpec = serde_yaml::from_str(&spec_content)?;
            let view = ModelView::new(&snapshot.entities, &snapshot.relationships);
            let options = GenerationOptions {
                overwrite_existing: overwrite,
                ..Default::default()
            };

            let artifacts = match modelforge::query::synthesize(&spec, &view, &options) {
                Ok(artifacts) => artifacts,
                Err(QueryError::Invalid(report)) => {
                    print_report(&report);
                    bail!("Join query {} is invalid", spec.base_entity_id);
                }
                Err(e) => return Err(e.into()),
            };
            for warning in &artifacts.warnings {
                println!("{} {}", "warning:".yellow().bold(), warning);
            }
            match output {
                Some(dir) => {
                    let result = Materializer::new(dir, WriteOptions::from(&options))
                        .materialize(artifacts.pending_files(&spec.base_entity_id))
                        .await;
                    for file in &result.written {
                        println!("{} {}", "wrote".green(), file.path.display());
                    }
                    for file in &result.skipped {
                        println!("{} {} ({})", "skipped".yellow(), file.path.display(), file.reason);
                    }
                    for file in &result.failed {
                        println!("{} {}: {}", "failed".red(), file.path.display(), file.error);
                    }
                }
                None => {
                    println!("{}", artifacts.sql);
                    println!("{}", serde_json::to_string_pretty(&artifacts.parameters)?);
                    println!("{}", serde_json::to_string_pretty(&artifacts.orm_query)?);
                }
            }
        }
        Commands::Generate { command } => match command {
            GenerateCommands::Template { name } => {
                info!("Generating template: {}", name);
                generate_commands::generate_template(name);
            }
            GenerateCommands::Sample { dir } => {
                info!("Generating sample in {}", dir);
                generate_commands::generate_sample(dir);
            }
        },
    }

    Ok(())
}

fn print_report(report: &ValidationResult) {
    for violation in &report.errors {
        println!(
            "{} {} [{}] {}",
            "error:".red().bold(),
            violation.field,
            violation.rule,
            violation.message
        );
    }
    for warning in &report.warnings {
        println!("{} {}", "warning:".yellow().bold(), warning);
    }
    if report.valid {
        println!("{}", "valid".green().bold());
    }
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("handlebars=off,{}", log_level)))
        .without_time()
        .init();
}
