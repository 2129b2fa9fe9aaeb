//! `scourd` — the Scour object auditor daemon.
//!
//! Re-reads every object on the node's drives, checks it against its stored
//! size and MD5, and quarantines anything corrupt.
//!
//! # Usage
//!
//! ```text
//! scourd                                   # audit forever, /etc/scour/scour.toml
//! scourd /path/to/scour.toml               # explicit config file
//! scourd --once                            # one sweep, then exit
//! scourd -d 10.0.0.1:8123,10.0.0.2:8123    # only these devices
//! ```

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use scour_audit::{
    DeviceEnumerator, ObjectAuditor, ReconCache, Shutdown, StaticTopology, SweepScheduler,
};
use scour_store::{ConnectionManager, FileConnector};
use tokio::sync::watch;
use tracing::{info, warn};

use config::CliConfig;

/// Config file read when none is given on the command line.
const DEFAULT_CONFIG_PATH: &str = "/etc/scour/scour.toml";

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "scourd", version, about = "Scour object integrity auditor")]
struct Cli {
    /// Path to TOML config file.
    config: Option<PathBuf>,

    /// Audit only these devices (comma separated `host:port` list).
    #[arg(short, long, value_delimiter = ',')]
    devices: Vec<String>,

    /// Run a single sweep and exit.
    #[arg(short, long)]
    once: bool,

    /// Override the configured log level.
    #[arg(long, env = "SCOUR_LOG_LEVEL")]
    log_level: Option<String>,
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    let (config_path, fallback) = match cli.config.as_deref() {
        Some(p) => (Some(p), false),
        None if default_path.exists() => (Some(default_path), false),
        None => (None, true),
    };
    let config = CliConfig::load(config_path).context("failed to load config")?;

    setup_tracing(cli.log_level.as_deref().unwrap_or(&config.log.level));
    if fallback {
        warn!(path = DEFAULT_CONFIG_PATH, "config file not found, using defaults");
    }

    let auditor_config = config.auditor_config().context("invalid [auditor] section")?;
    let connection_config = config
        .connection_config()
        .context("invalid [connection] section")?;
    let interval = config.interval().context("invalid [auditor] section")?;
    let topology =
        StaticTopology::new(config.policies()).context("invalid [[policy]] device list")?;

    info!(
        storage_root = %config.storage.root.display(),
        policies = config.policy.len(),
        bytes_per_second = auditor_config.max_bytes_per_second,
        files_per_second = auditor_config.max_files_per_second,
        interval_secs = interval.as_secs_f64(),
        "auditor configuration"
    );

    let connections = Arc::new(ConnectionManager::new(
        Arc::new(FileConnector::new(&config.storage.root)),
        connection_config,
    ));
    let auditor = Arc::new(ObjectAuditor::new(
        connections,
        DeviceEnumerator::new(Arc::new(topology)),
        auditor_config,
    ));

    let (tx, shutdown) = Shutdown::channel();
    tokio::spawn(watch_signals(tx));

    let scheduler = SweepScheduler::new(
        auditor,
        Arc::new(ReconCache::new(config.recon_cache_path())),
        shutdown,
    )
    .with_interval(interval)
    .with_overrides(cli.devices);

    if cli.once {
        let summary = scheduler.run_once().await;
        info!(
            elapsed_secs = summary.elapsed.as_secs_f64(),
            success = summary.stats.success,
            failures = summary.stats.failures,
            "single sweep done"
        );
    } else {
        scheduler.run_forever().await;
    }

    Ok(())
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set, otherwise uses the given level.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Flip the shutdown flag on Ctrl-C or SIGTERM.
async fn watch_signals(tx: watch::Sender<bool>) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "failed to listen for Ctrl-C");
                return;
            }
        }
        _ = terminate => {}
    }

    info!("shutdown requested");
    let _ = tx.send(true);
}
