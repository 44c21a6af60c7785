//! rollcall-svc - Attendance session processing service
//!
//! Accepts classroom video references, runs face recognition on a background
//! task, and serves attendance results, corrections, and history over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use rollcall_common::config::{default_config_path, TomlConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rollcall_svc::services::{NotificationDispatcher, RecognitionClient, SessionOrchestrator};
use rollcall_svc::{build_router, AppState};

#[derive(Debug, Parser)]
#[command(name = "rollcall-svc", version, about = "Attendance session processing service")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "ROLLCALL_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP listen address, overrides configuration
    #[arg(short, long)]
    bind: Option<String>,

    /// SQLite database path, overrides configuration
    #[arg(short, long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut config = TomlConfig::load(&config_path)?;
    config.apply_env_overrides();
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(database) = args.database {
        config.database_path = database;
    }
    config.validate()?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting rollcall-svc v{}", env!("CARGO_PKG_VERSION"));
    info!("Config: {}", config_path.display());
    info!("Database: {}", config.database_path.display());

    let db_pool = rollcall_svc::db::init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    info!("Database connection established");

    let recognizer = Arc::new(RecognitionClient::new(&config.recognition)?);
    let notifier = Arc::new(NotificationDispatcher::new(&config.notification)?);
    if !notifier.is_configured() {
        info!("Notification webhook not configured; parent notifications will be reported as failed");
    }

    let orchestrator = SessionOrchestrator::new(
        db_pool,
        recognizer,
        notifier,
        config.recognition.timeout(),
        config.processing.max_concurrent_jobs,
    );

    orchestrator.recover_stale_sessions().await?;

    let state = AppState::new(orchestrator);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
