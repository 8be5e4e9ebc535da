mod conflicts;
mod quotes;
mod style;
mod transfer;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use quotesync_core::config::AppConfig;
use quotesync_core::engine::SyncEngine;
use quotesync_core::remote::RemoteClient;
use quotesync_core::store::Store;

#[derive(Parser)]
#[command(name = "quotesync", version, about = "Manage and sync a local quote collection")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add a quote to the local collection.
    Add {
        /// The quote text.
        text: String,
        /// Category label.
        #[arg(short = 'g', long, default_value = "general")]
        category: String,
    },
    /// List quotes.
    List {
        /// Only show quotes in this category.
        #[arg(short = 'g', long)]
        category: Option<String>,
    },
    /// Remove a quote by id (prefixes accepted).
    Remove { id: String },
    /// List categories in use.
    Categories,
    /// Export the collection to a JSON file.
    Export {
        /// Output path.
        output: PathBuf,
    },
    /// Import quotes from a JSON file.
    Import {
        /// Input path.
        input: PathBuf,
        /// Merge into the existing collection instead of replacing it.
        #[arg(long)]
        merge: bool,
    },
    /// Run one sync cycle against the remote feed.
    Sync,
    /// Show sync status and collection counters.
    Status,
    /// Inspect and override recorded conflicts.
    Conflicts {
        #[command(subcommand)]
        command: ConflictCommand,
    },
    /// Write a commented default configuration file.
    Init {
        /// Destination path (defaults to the standard config location).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check that the configuration file loads and validates.
    Validate,
}

#[derive(Subcommand)]
enum ConflictCommand {
    /// List recorded conflicts.
    List {
        /// Filter by status (detected, overridden).
        #[arg(long)]
        status: Option<String>,
        /// Maximum rows to show.
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Show the full detail of one conflict.
    Show { id: String },
    /// Re-send the local pre-image of a conflict to the remote.
    Override { id: String },
}

fn default_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("could not determine the user config directory")?;
    Ok(base.join("quotesync").join("config.toml"))
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let path = match &cli.config {
        Some(p) => p.clone(),
        None => default_config_path()?,
    };
    AppConfig::load_and_resolve(&path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

fn open_store(config: &AppConfig) -> Result<Store> {
    std::fs::create_dir_all(&config.daemon.data_dir)
        .with_context(|| format!("failed to create {}", config.daemon.data_dir.display()))?;
    let store = Store::open(config.daemon.data_dir.join("quotesync.db"))?;
    store.initialize()?;
    Ok(store)
}

fn build_engine(config: AppConfig) -> Result<SyncEngine> {
    let store = open_store(&config)?;
    let remote = RemoteClient::new(
        config.remote.base_url.clone(),
        Duration::from_secs(config.remote.timeout_secs),
        config.remote.api_token.clone(),
    )?;
    Ok(SyncEngine::new(config, store, remote)?)
}

fn init_tracing(cli: &Cli, config: Option<&AppConfig>) {
    let level = cli
        .log_level
        .clone()
        .or_else(|| config.map(|c| c.daemon.log_level.clone()))
        .unwrap_or_else(|| "warn".to_string());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Init and validate must not require a loadable config; everything
    // else does.
    match &cli.command {
        Command::Init { output } => {
            init_tracing(&cli, None);
            return cmd_init(&cli, output.as_deref());
        }
        Command::Validate => {
            init_tracing(&cli, None);
            return cmd_validate(&cli);
        }
        _ => {}
    }

    let config = load_config(&cli)?;
    init_tracing(&cli, Some(&config));

    match &cli.command {
        Command::Add { text, category } => {
            let store = open_store(&config)?;
            quotes::add(&store, text, category)
        }
        Command::List { category } => {
            let store = open_store(&config)?;
            quotes::list(&store, category.as_deref())
        }
        Command::Remove { id } => {
            let store = open_store(&config)?;
            quotes::remove(&store, id)
        }
        Command::Categories => {
            let store = open_store(&config)?;
            quotes::categories(&store)
        }
        Command::Export { output } => {
            let store = open_store(&config)?;
            transfer::export(&store, output)
        }
        Command::Import { input, merge } => {
            let store = open_store(&config)?;
            transfer::import(&store, input, *merge)
        }
        Command::Sync => cmd_sync(config).await,
        Command::Status => cmd_status(config).await,
        Command::Conflicts { command } => match command {
            ConflictCommand::List { status, limit } => {
                let store = open_store(&config)?;
                conflicts::list(&store, status.as_deref(), *limit)
            }
            ConflictCommand::Show { id } => {
                let store = open_store(&config)?;
                conflicts::show(&store, id)
            }
            ConflictCommand::Override { id } => {
                let engine = build_engine(config)?;
                conflicts::override_conflict(&engine, id).await
            }
        },
        Command::Init { .. } | Command::Validate => unreachable!("handled above"),
    }
}

async fn cmd_sync(config: AppConfig) -> Result<()> {
    let engine = build_engine(config)?;
    let stats = engine.run_sync_cycle().await?;
    println!(
        "{}",
        style::success(&format!(
            "sync complete: {} remote items, {} admitted, {} attached, {} conflicts, {} skipped",
            stats.remote_items, stats.admitted, stats.attached, stats.conflicts, stats.skipped_malformed
        ))
    );
    if stats.conflicts > 0 {
        println!(
            "{}",
            style::warn(&format!(
                "{} conflict(s) recorded with the remote version applied; see 'quotesync conflicts list'",
                stats.conflicts
            ))
        );
    }
    if !stats.changed {
        println!("{}", style::dim("local collection already up to date"));
    }
    Ok(())
}

async fn cmd_status(config: AppConfig) -> Result<()> {
    let engine = build_engine(config)?;
    let status = engine.status().await?;

    println!("{}", style::header("QuoteSync status"));
    println!("  quotes           : {}", status.quote_count);
    match status.last_sync_at {
        Some(at) => println!("  last sync        : {}", at.to_rfc3339()),
        None => println!("  last sync        : {}", style::dim("never")),
    }
    println!("  sync cycles      : {}", status.total_cycles);
    println!("  sync errors      : {}", status.total_errors);
    println!("  conflicts total  : {}", status.total_conflicts);
    println!("  conflicts active : {}", status.active_conflicts);
    Ok(())
}

fn cmd_init(cli: &Cli, output: Option<&std::path::Path>) -> Result<()> {
    let path = match output {
        Some(p) => p.to_path_buf(),
        None => match &cli.config {
            Some(p) => p.clone(),
            None => default_config_path()?,
        },
    };
    if path.exists() {
        bail!("refusing to overwrite existing file {}", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(&path, AppConfig::default_toml())
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!(
        "{}",
        style::success(&format!("wrote default configuration to {}", path.display()))
    );
    println!("{}", style::dim("edit [remote].base_url before running sync"));
    Ok(())
}

fn cmd_validate(cli: &Cli) -> Result<()> {
    let path = match &cli.config {
        Some(p) => p.clone(),
        None => default_config_path()?,
    };
    match AppConfig::load_and_resolve(&path) {
        Ok(config) => {
            println!(
                "{}",
                style::success(&format!("{} is valid", path.display()))
            );
            println!("  remote feed   : {}", config.remote.base_url);
            println!("  sync interval : {}s", config.daemon.sync_interval_secs);
            println!("  data dir      : {}", config.daemon.data_dir.display());
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", style::error(&format!("{e}")));
            std::process::exit(1);
        }
    }
}
