//! ma-repair - backfill empty `utm_content` in stored attribution records
//!
//! Single pass over the records selected at start; re-running after a
//! successful pass repairs nothing further.

use anyhow::{Context, Result};
use clap::Parser;
use ma_common::config::{load_toml_or_default, resolve_config_path, LoggingConfig, CONFIG_ENV_VAR};
use ma_repair::config::REPAIR_CONFIG_FILE;
use ma_repair::{db, run_repair, RepairConfig, RepairOptions};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for ma-repair
#[derive(Parser, Debug)]
#[command(name = "ma-repair")]
#[command(about = "Recover empty utm_content values from session entry URLs")]
#[command(version)]
struct Args {
    /// SQLite database to repair
    #[arg(short, long, env = "MA_DATABASE")]
    database: Option<PathBuf>,

    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Report what would change without writing
    #[arg(long)]
    dry_run: bool,
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid log level")?;

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path =
        resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR, REPAIR_CONFIG_FILE);
    let config: RepairConfig = load_toml_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;

    init_tracing(&config.logging)?;

    // Build identification first, before any database work
    info!(
        "Starting ma-repair v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let db_path = config
        .resolve_database_path(args.database)
        .context("No database path given and no platform data directory available")?;
    info!("Database path: {}", db_path.display());

    let pool = db::connect(&db_path).await?;

    let options = RepairOptions {
        dry_run: args.dry_run,
        log_every: config.batch_log_every,
    };
    let report = run_repair(&pool, &options)
        .await
        .context("Failed to select records for repair")?;

    println!(
        "selected={} succeeded={} skipped={} failed={}",
        report.selected, report.succeeded, report.skipped, report.failed
    );

    pool.close().await;
    Ok(())
}
