//! QuoteSync daemon entry point.
//!
//! Loads configuration, initializes the store and sync engine, starts the
//! scheduler, and handles graceful shutdown.

mod scheduler;
mod signals;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use quotesync_core::config::AppConfig;
use quotesync_core::engine::SyncEngine;
use quotesync_core::remote::RemoteClient;
use quotesync_core::store::Store;

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// QuoteSync synchronization daemon.
#[derive(Parser, Debug)]
#[command(
    name = "quotesync-daemon",
    version,
    about = "Periodic quote synchronization daemon"
)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Override the log level from the config file (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load and resolve configuration
    let mut config =
        AppConfig::load_from_file(&args.config).context("failed to load configuration file")?;
    config.resolve_env_vars();
    config
        .validate()
        .context("configuration validation failed")?;

    // Initialize tracing
    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.daemon.log_level);

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .init();

    // Startup banner
    info!("========================================");
    info!("  QuoteSync Daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!("Config file   : {}", args.config.display());
    info!("Remote feed   : {}", config.remote.base_url);
    info!("Sync interval : {}s", config.daemon.sync_interval_secs);
    info!("Data dir      : {}", config.daemon.data_dir.display());
    info!("Log level     : {}", log_level);
    info!("========================================");

    // Ensure data directory exists
    std::fs::create_dir_all(&config.daemon.data_dir).context("failed to create data directory")?;

    // Initialize store
    let db_path = config.daemon.data_dir.join("quotesync.db");
    let store = Store::open(&db_path).context("failed to open store")?;
    store
        .initialize()
        .context("failed to initialize store schema")?;
    info!("Store initialized at {}", db_path.display());

    // Initialize remote client
    let remote = RemoteClient::new(
        config.remote.base_url.clone(),
        Duration::from_secs(config.remote.timeout_secs),
        config.remote.api_token.clone(),
    )
    .context("failed to build remote client")?;

    // Initialize sync engine
    let engine = Arc::new(
        SyncEngine::new(config.clone(), store, remote).context("failed to initialize engine")?,
    );
    info!("Sync engine initialized");

    // Create a shutdown notify for cooperative cancellation
    let shutdown = Arc::new(tokio::sync::Notify::new());
    let scheduler_shutdown = shutdown.clone();

    // Start the scheduler in a background task
    let sync_interval = Duration::from_secs(config.daemon.sync_interval_secs);
    let mut sched = scheduler::Scheduler::new(engine.clone(), sync_interval);
    let scheduler_handle = tokio::spawn(async move {
        sched.run(scheduler_shutdown).await;
    });

    // Wait for shutdown signal
    signals::wait_for_shutdown().await;

    info!("Shutdown signal received, stopping...");

    // Signal cooperative shutdown to the scheduler
    shutdown.notify_waiters();

    // Wait for the scheduler to finish its current cycle (up to 10s)
    match tokio::time::timeout(Duration::from_secs(10), scheduler_handle).await {
        Ok(Ok(())) => info!("scheduler stopped gracefully"),
        Ok(Err(e)) => warn!("scheduler task error: {}", e),
        Err(_) => warn!("scheduler did not stop within 10s, forcing shutdown"),
    }

    info!("QuoteSync daemon stopped.");
    Ok(())
}
