//! `mycoerp`: receiving desk on the local store.
//!
//! Dispatch delivery orders, watch them arrive, and run batch intake
//! against them.

mod commands;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use mycoerp_docstore::LiveStore;
use tracing::info;

use config::AppConfig;

/// Mushroom farm receiving tool.
#[derive(Parser, Debug)]
#[command(name = "mycoerp", about = "Receiving intake for farm deliveries")]
struct Cli {
    /// Path to config file (default: ./mycoerp.toml).
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides [storage].data_dir).
    #[arg(long = "data-dir", global = true)]
    data_dir: Option<PathBuf>,

    /// Output format: table or json.
    #[arg(long = "output", short = 'o', global = true, default_value = "table")]
    output: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a delivery order (farm side). It shows up as IN_TRANSIT.
    Dispatch {
        #[arg(long = "batch")]
        batch_id: Option<String>,
        #[arg(long = "entity")]
        entity_id: Option<String>,
        /// Farm name, used when the entity has no mapping.
        #[arg(long = "farm")]
        source_farm: Option<String>,
        #[arg(long)]
        species: Option<String>,
        #[arg(long = "flush")]
        flush_number: Option<String>,
        /// Estimated yield in kg.
        #[arg(long = "yield")]
        estimated_yield: Option<f64>,
        /// Send time (RFC 3339). Defaults to now.
        #[arg(long = "sent-at")]
        sent_at: Option<String>,
    },

    /// List in-transit alerts with their countdowns.
    Alerts,

    /// Receive a batch, linked to an alert or entered manually.
    Intake {
        /// Delivery order to claim. Locks batch, farm, species and flush.
        #[arg(long)]
        alert: Option<String>,
        #[arg(long = "batch")]
        batch_id: Option<String>,
        #[arg(long = "farm")]
        source_farm: Option<String>,
        #[arg(long)]
        species: Option<String>,
        #[arg(long = "flush")]
        flush_number: Option<String>,
        /// Raw weight in kg. Defaults to the alert's estimate when linked.
        #[arg(long)]
        raw: Option<String>,
        /// Spoiled weight in kg.
        #[arg(long)]
        spoiled: Option<String>,
    },

    /// List committed inventory batches.
    Batches,

    /// Follow the alert feed until Ctrl-C.
    Watch,

    /// Show version.
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Commands::Version = cli.command {
        println!("mycoerp v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let app = AppConfig::load(&config_path)?;
    let store = open_store(&app, cli.data_dir.as_deref())?;
    let json_output = cli.output == "json";

    match cli.command {
        Commands::Dispatch {
            batch_id,
            entity_id,
            source_farm,
            species,
            flush_number,
            estimated_yield,
            sent_at,
        } => {
            let order = commands::orders::NewOrder {
                batch_id,
                entity_id,
                source_farm,
                species,
                flush_number,
                estimated_yield,
                sent_at,
            };
            commands::orders::dispatch(store.as_ref(), &app, order).await?;
        }

        Commands::Alerts => {
            commands::orders::alerts(store, &app, json_output)?;
        }

        Commands::Intake {
            alert,
            batch_id,
            source_farm,
            species,
            flush_number,
            raw,
            spoiled,
        } => {
            let input = commands::intake::IntakeArgs {
                alert,
                batch_id,
                source_farm,
                species,
                flush_number,
                raw,
                spoiled,
            };
            commands::intake::intake(store, &app, input, json_output).await?;
        }

        Commands::Batches => {
            commands::intake::batches(store.as_ref(), &app, json_output).await?;
        }

        Commands::Watch => {
            commands::orders::watch(store, &app).await?;
        }

        Commands::Version => {}
    }

    Ok(())
}

/// Open the redb-backed document store.
fn open_store(app: &AppConfig, data_dir: Option<&std::path::Path>) -> anyhow::Result<Arc<LiveStore>> {
    let service = app.service_config(data_dir);
    if let Some(dir) = &service.data_dir {
        std::fs::create_dir_all(dir)?;
    }
    let db_path = service.resolve_db_path();
    info!("Opening store at {}", db_path.display());
    let kv: Arc<dyn mycoerp_kv::KVStore> = Arc::new(
        mycoerp_kv::RedbStore::open(&db_path)
            .map_err(|e| anyhow::anyhow!("failed to open KV store: {}", e))?,
    );
    Ok(Arc::new(LiveStore::new(kv)))
}
