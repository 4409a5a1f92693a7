//! TeleSync Daemon - Background mirroring service
//!
//! This binary mirrors attachments from the exported saved messages onto a
//! mounted network share and handles:
//! - Configuration loading with environment overrides
//! - A run at startup plus a daily run at a fixed time
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon wires an `ExportArchiveSource` and a `MountedShareStore`
//! into a `RunCoordinator` and hands it to the `DailyScheduler`. The
//! scheduler loop is controlled by a `CancellationToken` that is triggered
//! on receipt of SIGTERM or SIGINT; an in-flight run releases its session
//! before the process exits.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use telesync_core::config::{expand_home, Config, DestinationConfig};
use telesync_sync::coordinator::RunCoordinator;
use telesync_sync::export::ExportArchiveSource;
use telesync_sync::scheduler::DailyScheduler;
use telesync_sync::share::MountedShareStore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Levels in increasing verbosity
const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Debug, Parser)]
#[command(
    name = "telesyncd",
    version,
    about = "Mirror saved-message attachments to a network share"
)]
struct Args {
    /// Use alternate config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a single sync pass and exit
    #[arg(long)]
    once: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// ============================================================================
// Setup helpers
// ============================================================================

/// Loads the configuration file and overlays the environment and `.env`
fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path()),
    };
    config
        .apply_env_overrides()
        .context("Failed to read environment overrides")?;

    let errors = config.validate();
    if !errors.is_empty() {
        let lines: Vec<String> = errors.iter().map(ToString::to_string).collect();
        bail!("Invalid configuration:\n  {}", lines.join("\n  "));
    }
    Ok(config)
}

/// Configured level raised by one step per `-v`
fn effective_level(configured: &str, verbose: u8) -> &'static str {
    let base = LEVELS
        .iter()
        .position(|l| l.eq_ignore_ascii_case(configured))
        .unwrap_or(2);
    LEVELS[(base + verbose as usize).min(LEVELS.len() - 1)]
}

fn init_tracing(config: &Config, verbose: u8) {
    let level = effective_level(&config.logging.level, verbose);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

/// Where the share is mounted: the configured root, else `/mnt/<share>`
fn mount_root(destination: &DestinationConfig) -> PathBuf {
    match (&destination.mount_root, destination.share.as_deref()) {
        (Some(root), _) => expand_home(root),
        (None, Some(share)) if !share.trim().is_empty() => PathBuf::from("/mnt").join(share.trim()),
        _ => PathBuf::from("/mnt"),
    }
}

async fn build_coordinator(config: &Config) -> Result<RunCoordinator> {
    let Some(export_dir) = config.source.export_dir.as_deref() else {
        bail!("source.export_dir (or TELESYNC_EXPORT_DIR) must name an export directory");
    };
    let export_dir = expand_home(export_dir);

    let source = ExportArchiveSource::open(&export_dir)
        .await
        .context("Failed to open export archive")?;
    let store = MountedShareStore::new(mount_root(&config.destination));
    info!(
        export_dir = %export_dir.display(),
        entries = source.entry_count(),
        mount_root = %store.root().display(),
        "Adapters ready"
    );

    Ok(RunCoordinator::new(Arc::new(source), Arc::new(store), config))
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;
    init_tracing(&config, args.verbose);

    info!("TeleSync daemon starting (telesyncd)");
    if !config.destination.is_complete() {
        warn!(
            missing = ?config.destination.missing_fields(),
            "Destination settings incomplete; runs will be skipped"
        );
    }

    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let mut coordinator = build_coordinator(&config).await?;

    if args.once {
        let result = coordinator.run_sync(&shutdown_token).await?;
        if !result.is_clean() {
            for message in &result.errors {
                error!(error = %message, "Item not mirrored");
            }
            bail!("{} of {} items failed", result.failed(), result.examined);
        }
        return Ok(());
    }

    let mut scheduler = DailyScheduler::new(coordinator, &config.schedule)?;
    scheduler.run(shutdown_token).await;

    info!("TeleSync daemon shut down gracefully");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
