//! ecomat-ingest - Dataset version pipeline service
//!
//! Watches the KBOB construction-materials impact dataset for new xlsx
//! releases, parses them and holds each release for operator approval
//! before promoting it to the current version. Serves the version history
//! over HTTP for downstream consumers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ecomat_common::config;
use ecomat_ingest::services::notifier::WebhookNotifier;
use ecomat_ingest::services::pacing::Pacer;
use ecomat_ingest::services::{
    ApprovalEngine, DirectoryMonitor, DiscoverySource, Downloader, IngestPipeline, Notifier,
    PublisherCrawler, Scheduler,
};
use ecomat_ingest::store::VersionStore;
use ecomat_ingest::AppState;

/// Command-line arguments for ecomat-ingest
#[derive(Parser, Debug)]
#[command(name = "ecomat-ingest")]
#[command(about = "Version pipeline for the KBOB construction-material impact dataset")]
#[command(version)]
struct Args {
    /// Config file (TOML); defaults to the platform config directory
    #[arg(short, long, env = "ECOMAT_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on, overriding the config file
    #[arg(short, long, env = "ECOMAT_PORT")]
    port: Option<u16>,

    /// Data folder holding the database and download cache
    #[arg(short, long, env = "ECOMAT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Run a single ingest pass and exit instead of serving
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ecomat_ingest=info,ecomat_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "Starting ecomat-ingest v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = config::load_config(args.config.as_deref()).context("Failed to load config")?;
    let data_dir = config::resolve_data_dir(args.data_dir.as_deref(), &config);
    info!("Data folder: {}", data_dir.display());

    let db_path = config::database_path(&data_dir);
    info!("Database: {}", db_path.display());
    let db = ecomat_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let store = VersionStore::new(db.clone());

    let notifier = match &config.notify.webhook_url {
        Some(url) => {
            info!("Notifications: webhook {}", url);
            Notifier::Webhook(
                WebhookNotifier::new(url.clone(), Duration::from_secs(config.notify.timeout_secs))
                    .context("Failed to build webhook client")?,
            )
        }
        None => {
            info!("Notifications: log only (no webhook configured)");
            Notifier::Log
        }
    };

    let approval = Arc::new(ApprovalEngine::new(store.clone(), notifier.clone()));

    // All publisher traffic shares one pacer so the politeness delay holds
    // across crawler, monitor and downloader.
    let pacer = Arc::new(Pacer::new(Duration::from_millis(config.ingest.request_delay_ms)));
    let http_timeout = Duration::from_secs(config.ingest.http_timeout_secs);

    let crawler = PublisherCrawler::new(
        config.ingest.publisher_url.clone(),
        pacer.clone(),
        http_timeout,
        config.ingest.discovery_retries,
    )
    .context("Failed to build crawler")?;

    let monitor = DirectoryMonitor::new(
        config.ingest.file_host_base.clone(),
        pacer.clone(),
        http_timeout,
    )
    .context("Failed to build directory monitor")?;

    let downloader = Downloader::new(config::downloads_dir(&data_dir), pacer, http_timeout)
        .context("Failed to build downloader")?;

    let pipeline = Arc::new(IngestPipeline::new(
        DiscoverySource::Publisher(crawler),
        Some(monitor),
        downloader,
        store.clone(),
        approval.clone(),
        notifier,
    ));

    if args.once {
        let outcome = pipeline.run_once().await;
        info!(outcome = ?outcome, "Single ingest pass finished");
        return Ok(());
    }

    let run_gate = Arc::new(tokio::sync::Mutex::new(()));

    let scheduler = Arc::new(Scheduler::new(
        pipeline.clone(),
        run_gate.clone(),
        Duration::from_secs(config.ingest.check_interval_secs.max(1)),
        config.ingest.check_enabled && config.ingest.check_interval_secs > 0,
    ));
    tokio::spawn(scheduler.run());

    let state = AppState::new(db, store, approval, pipeline, run_gate);
    let app = ecomat_ingest::build_router(state);

    let port = args.port.unwrap_or(config.server.port);
    let addr = format!("{}:{}", config.server.host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
