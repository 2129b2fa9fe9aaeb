//! TOML configuration for the Scour daemon.
//!
//! Every section is optional; anything left out falls back to the defaults
//! the auditor ships with.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use scour_audit::AuditorConfig;
use scour_audit::recon::DEFAULT_RECON_CACHE_PATH;
use scour_store::ConnectionConfig;
use scour_types::PolicyIndex;
use serde::Deserialize;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Sweep cadence and rate limits.
    pub auditor: AuditorSection,
    /// Drive connection tuning.
    pub connection: ConnectionSection,
    /// Where drives live.
    pub storage: StorageSection,
    /// Object rings, one table per storage policy.
    pub policy: Vec<PolicySection>,
    /// Logging configuration.
    pub log: LogSection,
}

/// A rate given either as a plain number or a string like `"10MB/s"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Rate {
    /// Units per second.
    Number(f64),
    /// Human-readable rate.
    Text(String),
}

/// `[auditor]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AuditorSection {
    /// Minimum seconds between sweep starts. Defaults to 30.
    pub interval_secs: Option<f64>,
    /// Byte read ceiling. Defaults to 10 000 000 bytes/s.
    pub bytes_per_second: Option<Rate>,
    /// Object audit ceiling. Defaults to 20 objects/s.
    pub files_per_second: Option<f64>,
    /// Recon cache file. Defaults to `/var/cache/scour/object.recon`.
    pub recon_cache_path: Option<PathBuf>,
    /// Keys per range listing. Defaults to 800.
    pub scan_page_size: Option<usize>,
    /// Seconds between progress log lines. Defaults to 3600.
    pub log_interval_secs: Option<u64>,
}

/// `[connection]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConnectionSection {
    /// Seconds to wait for a connect. Defaults to 3.
    pub connect_timeout_secs: Option<f64>,
    /// Seconds to wait for any single drive operation. Defaults to 30.
    pub response_timeout_secs: Option<f64>,
    /// Connect attempts per device. Defaults to 3.
    pub connect_retry: Option<u32>,
    /// Keep connections open between sweeps.
    pub persist_connection: bool,
}

/// `[storage]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory holding one sub-directory per drive, named `host:port`.
    pub root: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/srv/scour"),
        }
    }
}

/// `[[policy]]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PolicySection {
    /// Storage policy index.
    pub index: PolicyIndex,
    /// Object ring devices (`host:port`). Empty strings mark removed slots.
    pub devices: Vec<String>,
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Load config from a TOML file, or use defaults if no path given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("failed to read {}", p.display()))?;
                let config: CliConfig = toml::from_str(&content)
                    .with_context(|| format!("failed to parse {}", p.display()))?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Effective sweep interval.
    pub fn interval(&self) -> anyhow::Result<Duration> {
        secs("auditor.interval_secs", self.auditor.interval_secs.unwrap_or(30.0))
    }

    /// Effective auditor tunables.
    pub fn auditor_config(&self) -> anyhow::Result<AuditorConfig> {
        let defaults = AuditorConfig::default();
        let max_bytes_per_second = match &self.auditor.bytes_per_second {
            None => defaults.max_bytes_per_second,
            Some(Rate::Number(n)) => *n,
            Some(Rate::Text(s)) => match parse_bandwidth(s) {
                Some(bytes) => bytes as f64,
                None => bail!("invalid auditor.bytes_per_second: {s:?}"),
            },
        };
        let max_files_per_second = self
            .auditor
            .files_per_second
            .unwrap_or(defaults.max_files_per_second);
        check_rate("auditor.bytes_per_second", max_bytes_per_second)?;
        check_rate("auditor.files_per_second", max_files_per_second)?;
        Ok(AuditorConfig {
            max_bytes_per_second,
            max_files_per_second,
            scan_page_size: self
                .auditor
                .scan_page_size
                .unwrap_or(defaults.scan_page_size),
            log_interval: self
                .auditor
                .log_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.log_interval),
        })
    }

    /// Effective recon cache path.
    pub fn recon_cache_path(&self) -> PathBuf {
        self.auditor
            .recon_cache_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RECON_CACHE_PATH))
    }

    /// Effective drive connection settings.
    pub fn connection_config(&self) -> anyhow::Result<ConnectionConfig> {
        let defaults = ConnectionConfig::default();
        let section = &self.connection;
        Ok(ConnectionConfig {
            connect_timeout: match section.connect_timeout_secs {
                Some(s) => secs("connection.connect_timeout_secs", s)?,
                None => defaults.connect_timeout,
            },
            response_timeout: match section.response_timeout_secs {
                Some(s) => secs("connection.response_timeout_secs", s)?,
                None => defaults.response_timeout,
            },
            connect_retry: section.connect_retry.unwrap_or(defaults.connect_retry),
            persist_connection: section.persist_connection,
            ..defaults
        })
    }

    /// `(policy, devices)` pairs for building the topology.
    pub fn policies(&self) -> Vec<(PolicyIndex, Vec<String>)> {
        self.policy
            .iter()
            .map(|p| (p.index, p.devices.clone()))
            .collect()
    }
}

/// Rates must be finite and non-negative; `0` means unlimited.
fn check_rate(name: &str, value: f64) -> anyhow::Result<()> {
    if !value.is_finite() || value < 0.0 {
        bail!("invalid {name}: {value}");
    }
    Ok(())
}

fn secs(name: &str, value: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("invalid {name}: {value}"))
}

/// Parse a human-readable bandwidth string into bytes per second.
///
/// Supports: `"10MB/s"`, `"1GB/s"`, `"512KB/s"`, `"1048576"` (raw bytes).
fn parse_bandwidth(s: &str) -> Option<u64> {
    let s = s.trim().trim_end_matches("/s");
    let (num, unit) = if let Some(num) = s.strip_suffix("GB") {
        (num, 1_073_741_824)
    } else if let Some(num) = s.strip_suffix("MB") {
        (num, 1_048_576)
    } else if let Some(num) = s.strip_suffix("KB") {
        (num, 1_024)
    } else {
        (s, 1)
    };
    num.trim().parse::<u64>().ok()?.checked_mul(unit)
}
