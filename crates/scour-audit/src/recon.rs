//! Sweep-completion reporting for monitoring ("recon").

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::AuditError;

/// Key under which the last full sweep duration (seconds) is stored.
pub const OBJECT_AUDIT_SWEEP: &str = "object_audit_sweep";

/// Default location of the recon cache file.
pub const DEFAULT_RECON_CACHE_PATH: &str = "/var/cache/scour/object.recon";

/// Destination for sweep metrics.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Record `value` under `key`, replacing any previous value.
    async fn report(&self, key: &str, value: f64) -> Result<(), AuditError>;
}

/// A JSON object on disk shared with other reporters.
///
/// Each report loads the whole object, updates a single key, and writes it
/// back through a temporary file so readers never see a partial file.
#[derive(Debug, Clone)]
pub struct ReconCache {
    path: PathBuf,
}

impl ReconCache {
    /// Cache stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current cache contents. Missing or unparsable files read as
    /// an empty object.
    pub async fn load(&self) -> Result<Map<String, Value>, AuditError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(AuditError::Recon {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        match serde_json::from_slice::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                warn!(path = %self.path.display(), "recon cache is not a JSON object, starting fresh");
                Ok(Map::new())
            }
        }
    }

    fn recon_err(&self, source: std::io::Error) -> AuditError {
        AuditError::Recon {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl ReportSink for ReconCache {
    async fn report(&self, key: &str, value: f64) -> Result<(), AuditError> {
        let mut map = self.load().await?;
        map.insert(key.to_string(), Value::from(value));
        let encoded = serde_json::to_vec(&Value::Object(map))?;

        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| self.recon_err(e))?;
        }

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recon".to_string());
        let tmp = self
            .path
            .with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, &encoded)
            .await
            .map_err(|e| self.recon_err(e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(self.recon_err(e));
        }

        debug!(path = %self.path.display(), key, value, "recon cache updated");
        Ok(())
    }
}

/// Keeps reports in memory. Useful for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySink {
    values: Mutex<BTreeMap<String, Vec<f64>>>,
}

impl MemorySink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every value reported under `key`, oldest first.
    pub fn values(&self, key: &str) -> Vec<f64> {
        self.values
            .lock()
            .expect("lock poisoned")
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// The most recent value reported under `key`.
    pub fn last(&self, key: &str) -> Option<f64> {
        self.values(key).last().copied()
    }
}

#[async_trait]
impl ReportSink for MemorySink {
    async fn report(&self, key: &str, value: f64) -> Result<(), AuditError> {
        self.values
            .lock()
            .expect("lock poisoned")
            .entry(key.to_string())
            .or_default()
            .push(value);
        Ok(())
    }
}
