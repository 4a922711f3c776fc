//! Weather Ingestion Scheduler
//!
//! Operator entry point handling:
//! - Poll cycles that enqueue processing jobs for updated source files
//! - Retention runs over the weather database and the parsed file ledger
//! - Parser resolution for single files
//! - A long-running daemon combining the above on fixed intervals

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::signal;
use tracing::{error, info, warn};

use ingest_core::{ParserRegistry, ProcessRequest, RetentionPolicy};
use queue::{PgJobQueue, QueueConfig};
use store::{StoreClient, StoreConfig};
use telemetry::{health, init_tracing_from_env};
use worker::{
    HttpPoller, PollScheduler, PollerConfig, RetentionEngine, WorkerConfig, WorkerScheduler,
};

#[derive(Debug, Parser)]
#[command(name = "weather-ingest", version, about = "Weather data ingestion scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Detect updated files and optionally enqueue them for processing
    Poll {
        /// Submit processing jobs instead of only listing the files
        #[arg(long)]
        enqueue: bool,
    },
    /// Delete obsolete and expired records and ledger entries
    Clean,
    /// Show which parser handles a file
    Resolve {
        #[arg(long)]
        path: Option<String>,
        #[arg(long)]
        url: Option<String>,
    },
    /// Run polling and retention on their intervals until interrupted
    Run,
}

impl Command {
    /// Whether the command reads or writes the job queue tables.
    fn uses_queue(&self) -> bool {
        match self {
            Self::Poll { enqueue } => *enqueue,
            Self::Run => true,
            Self::Clean | Self::Resolve { .. } => false,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, serde::Deserialize)]
struct Config {
    #[serde(default)]
    store: StoreConfig,

    #[serde(default)]
    queue: QueueConfig,

    #[serde(default)]
    poller: PollerConfig,

    #[serde(default)]
    worker: WorkerConfig,

    #[serde(default)]
    retention: RetentionPolicy,
}

/// Shared handles built from the configuration.
struct App {
    store: Arc<StoreClient>,
    queue: Arc<PgJobQueue>,
    registry: Arc<ParserRegistry>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    let cli = Cli::parse();
    let config = load_config()?;
    let with_queue = cli.command.uses_queue();

    match cli.command {
        Command::Resolve { path, url } => resolve(path, url),
        Command::Poll { enqueue } => {
            let app = connect(&config, with_queue).await?;
            let scheduler = poll_scheduler(&app, &config)?;
            let cycle = scheduler
                .run_poll_cycle(enqueue)
                .await
                .context("Poll cycle failed")?;
            print_json(&cycle)
        }
        Command::Clean => {
            let app = connect(&config, with_queue).await?;
            let engine = RetentionEngine::new(app.store.clone(), config.retention.clone())
                .context("Invalid retention policy")?;
            let report = engine.run().await.context("Retention run failed")?;
            print_json(&report)
        }
        Command::Run => run(config).await,
    }
}

async fn run(config: Config) -> Result<()> {
    info!("Starting weather ingestion scheduler v{}", env!("CARGO_PKG_VERSION"));

    let app = connect(&config, true).await?;
    let report = health().report();
    if !health().is_ready() {
        app.store.pool().close().await;
        anyhow::bail!("Not ready: {}", report.failures().join(", "));
    }
    info!(status = ?report.status, "All components ready");

    let poll = Arc::new(poll_scheduler(&app, &config)?);
    let retention = Arc::new(
        RetentionEngine::new(app.store.clone(), config.retention.clone())
            .context("Invalid retention policy")?,
    );

    let scheduler = Arc::new(WorkerScheduler::new(config.worker.clone(), poll, retention));
    let handles = scheduler.start();

    shutdown_signal().await;

    info!("Shutting down...");
    for handle in handles {
        handle.abort();
    }
    app.store.pool().close().await;

    info!("Shutdown complete");
    Ok(())
}

fn resolve(path: Option<String>, url: Option<String>) -> Result<()> {
    let registry = ParserRegistry::with_defaults().context("Failed to build parser registry")?;
    let request = ProcessRequest::new(path, url)?;
    let parser = registry.resolve_request(&request)?;

    println!(
        "{} -> {} (priority {})",
        request.location(),
        parser.name,
        parser.priority
    );
    Ok(())
}

/// Connects to Postgres, creates missing tables and records component health.
///
/// The job queue tables are only created and checked when `with_queue` is set.
async fn connect(config: &Config, with_queue: bool) -> Result<App> {
    let store = Arc::new(
        StoreClient::new(config.store.clone()).context("Failed to create Postgres client")?,
    );
    let queue = Arc::new(PgJobQueue::new(store.pool().clone()));

    store::health::init_schema(&store)
        .await
        .context("Failed to initialize weather schema")?;
    if with_queue {
        queue
            .init_schema()
            .await
            .context("Failed to initialize job queue schema")?;
    }

    check_health(&store, with_queue.then_some(queue.as_ref())).await;

    let registry = Arc::new(
        ParserRegistry::with_defaults().context("Failed to build parser registry")?,
    );

    Ok(App {
        store,
        queue,
        registry,
    })
}

fn poll_scheduler(app: &App, config: &Config) -> Result<PollScheduler> {
    if config.poller.urls.is_empty() {
        warn!("No source URLs configured; poll cycles will find nothing");
    }
    let poller = HttpPoller::new(&config.poller, app.store.clone())
        .context("Failed to create HTTP poller")?;

    Ok(PollScheduler::new(
        Arc::new(poller),
        app.queue.clone(),
        app.registry.clone(),
        config.queue.clone(),
    ))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("WEATHER")
                .prefix_separator("__")
                .list_separator(",")
                .with_list_parse_key("poller.urls")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.store.url = url;
    }

    Ok(config)
}

/// Check component health on startup.
async fn check_health(store: &StoreClient, queue: Option<&PgJobQueue>) {
    if store::health::check_connection(store).await {
        health().database.set_healthy();
        info!("Postgres connection: healthy");
    } else {
        health().database.set_unhealthy("Connection failed");
        error!("Postgres connection: unhealthy");
    }

    let Some(queue) = queue else {
        return;
    };
    if queue::health::check_connection(queue).await {
        health().queue.set_healthy();
        info!("Job queue: healthy");
    } else {
        health().queue.set_unhealthy("Queue tables unavailable");
        error!("Job queue: unhealthy");
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
