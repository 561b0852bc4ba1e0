//! Folio CLI: operator commands for the media pipeline.
//!
//! Reads configuration from the environment (and `.env`). Commands that queue
//! pipeline work wait for it to finish before printing the asset.

use clap::{Parser, Subcommand};
use folio_cli::{describe_error, guess_mime, truncate, vision_classifier, Services, Stores};
use folio_core::models::{EntityKind, MediaSource, RuleDefinition};
use folio_core::{AppError, Config};
use folio_db::{MediaStore, WorkflowExecutionLog, WorkflowRuleStore};
use folio_infra::{init_telemetry, shutdown_telemetry, LogFormat};
use folio_worker::UploadRequest;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "folio", about = "Folio media pipeline CLI")]
struct Cli {
    /// Keep records in memory instead of Postgres (nothing is persisted)
    #[arg(long, global = true, env = "FOLIO_IN_MEMORY")]
    in_memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,
    /// Upload a local image and run the pipeline on it
    Ingest {
        /// Path to the image
        file: PathBuf,
        /// Declared MIME type (guessed from the extension when omitted)
        #[arg(long)]
        mime: Option<String>,
    },
    /// Regenerate resolution variants from the stored original
    Reprocess {
        /// Media asset UUID
        id: Uuid,
    },
    /// Return a failed or abandoned asset to pending and run it again
    Resubmit {
        /// Media asset UUID
        id: Uuid,
    },
    /// Print an asset and its rule executions
    Show {
        /// Media asset UUID
        id: Uuid,
    },
    /// Create an artwork or tattoo from a completed asset
    Link {
        /// Media asset UUID
        id: Uuid,
        /// artwork or tattoo (defaults to the detected category)
        #[arg(long)]
        kind: Option<EntityKind>,
    },
    /// Workflow rule operations
    Rules {
        #[command(subcommand)]
        sub: RuleCommands,
    },
}

#[derive(Subcommand)]
enum RuleCommands {
    /// Create a rule from a JSON definition file
    Add {
        /// Path to the rule definition
        file: PathBuf,
    },
    /// List rules, optionally only enabled ones for a trigger
    List {
        #[arg(long)]
        trigger: Option<String>,
    },
}

fn print_json(value: &impl Serialize) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = run(cli).await;
    shutdown_telemetry().await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", describe_error(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = Config::from_env()?;
    config.validate()?;

    let log_format = config.log_format.parse::<LogFormat>().unwrap_or_default();
    init_telemetry(log_format, folio_infra::telemetry::DEFAULT_FILTER)?;

    if let Commands::Migrate = cli.command {
        if cli.in_memory {
            return Err(AppError::InvalidInput(
                "migrate needs a database; drop --in-memory".to_string(),
            ));
        }
        let pool = folio_db::connect(&config.database_url, config.db_max_connections).await?;
        folio_db::run_migrations(&pool).await?;
        println!("migrations applied");
        return Ok(());
    }

    let stores = if cli.in_memory {
        Stores::in_memory()
    } else {
        Stores::postgres(&config).await?
    };
    let storage = folio_storage::create_storage(&config).await?;
    let services = Services::assemble(&config, stores, storage, vision_classifier(&config));

    let result = dispatch(&services, cli.command).await;
    services.queue.shutdown();
    result
}

async fn dispatch(services: &Services, command: Commands) -> Result<(), AppError> {
    match command {
        Commands::Migrate => Ok(()),
        Commands::Ingest { file, mime } => {
            let data = tokio::fs::read(&file).await?;
            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| AppError::InvalidInput(format!("{} is not a file", file.display())))?;
            let declared_mime = mime.unwrap_or_else(|| guess_mime(&file).to_string());

            let asset = services
                .ingest
                .ingest(UploadRequest {
                    data: bytes::Bytes::from(data),
                    filename,
                    declared_mime,
                    source: MediaSource::Upload,
                })
                .await?;
            services.queue.drain().await;
            print_asset(services, asset.id).await
        }
        Commands::Reprocess { id } => {
            services.ingest.reprocess(id).await?;
            services.queue.drain().await;
            print_asset(services, id).await
        }
        Commands::Resubmit { id } => {
            services.ingest.resubmit(id).await?;
            services.queue.drain().await;
            print_asset(services, id).await
        }
        Commands::Show { id } => print_asset(services, id).await,
        Commands::Link { id, kind } => {
            let entity = services.linker.create_entity_from_asset(id, kind).await?;
            print_json(&entity)
        }
        Commands::Rules { sub } => match sub {
            RuleCommands::Add { file } => {
                let raw = tokio::fs::read_to_string(&file).await?;
                let definition: RuleDefinition = serde_json::from_str(&raw)?;
                let rule = services.engine.create_rule(&definition).await?;
                print_json(&rule)
            }
            RuleCommands::List { trigger } => {
                let rules = match trigger {
                    Some(trigger) => {
                        services
                            .stores
                            .rules
                            .list_enabled_for_trigger(&trigger)
                            .await?
                    }
                    None => services.stores.rules.list().await?,
                };
                for rule in &rules {
                    println!(
                        "{}  {:<10} p{:<4} {:<5} {}",
                        rule.id,
                        rule.trigger,
                        rule.priority,
                        if rule.enabled { "on" } else { "off" },
                        truncate(&rule.name, 48)
                    );
                }
                if rules.is_empty() {
                    println!("no rules");
                }
                Ok(())
            }
        },
    }
}

async fn print_asset(services: &Services, id: Uuid) -> Result<(), AppError> {
    let asset = services
        .stores
        .media
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Media asset {}", id)))?;
    let executions = services.stores.executions.list_for_media(id).await?;
    print_json(&serde_json::json!({
        "asset": asset,
        "rule_executions": executions,
    }))
}
