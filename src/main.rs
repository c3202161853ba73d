use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use shiptrack_api::{
    config::AppConfig,
    db,
    entities::OrderStatus,
    events,
    import::legacy::LegacyDump,
    services::imports::{ImportService, StatusUpdateRequest},
    services::reconciliation::MergeMode,
    services::tracking::TrackingService,
};

#[derive(Parser)]
#[command(
    name = "shiptrack",
    about = "Shipment tracking import and reconciliation toolkit",
    version
)]
struct Cli {
    /// Override the configured database URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a carrier CSV export, replacing each shipment's history
    ImportCsv {
        path: PathBuf,
        /// Merge into existing history instead of replacing it
        #[arg(long)]
        append: bool,
    },
    /// Import a legacy bulk JSON dump, preserving its numeric ids
    ImportLegacy { path: PathBuf },
    /// Apply a JSON array of append-mode status update requests
    ApplyUpdates { path: PathBuf },
    /// Resolve a tracking id and print the shipment with its history
    Track { tracking_id: String },
    /// Print the status enumeration as {value, label} pairs
    StatusOptions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::StatusOptions = cli.command {
        println!("{}", serde_json::to_string_pretty(&OrderStatus::options())?);
        return Ok(());
    }

    let mut config = AppConfig::load().context("loading configuration")?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let pool = db::establish_connection_from_app_config(&config)
        .await
        .context("connecting to database")?;
    db::run_migrations(&pool).await.context("running migrations")?;
    let pool = Arc::new(pool);

    let (sender, receiver) = events::channel(64);
    let event_task = tokio::spawn(events::process_events(receiver));

    match cli.command {
        Commands::ImportCsv { path, append } => {
            let mode = if append {
                MergeMode::Append
            } else {
                MergeMode::ReplaceAll
            };
            let service = ImportService::new(pool.clone(), sender.clone());
            let report = service.import_csv_file(&path, mode).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::ImportLegacy { path } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let dump: LegacyDump = serde_json::from_str(&text)
                .with_context(|| format!("parsing legacy dump {}", path.display()))?;
            let service = ImportService::new(pool.clone(), sender.clone());
            let report = service.import_legacy_dump(dump).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::ApplyUpdates { path } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let updates: Vec<StatusUpdateRequest> = serde_json::from_str(&text)
                .with_context(|| format!("parsing update requests {}", path.display()))?;
            let service = ImportService::new(pool.clone(), sender.clone());
            let report = service.apply_status_updates(updates).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Track { tracking_id } => {
            let service = TrackingService::new(pool.clone());
            match service.track(&tracking_id).await? {
                Some(tracked) => println!("{}", serde_json::to_string_pretty(&tracked)?),
                None => anyhow::bail!("no shipment matches tracking id {tracking_id:?}"),
            }
        }
        Commands::StatusOptions => unreachable!("handled before startup"),
    }

    drop(sender);
    let _ = event_task.await;
    Ok(())
}
