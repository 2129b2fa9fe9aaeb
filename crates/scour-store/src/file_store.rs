//! File-based drive emulation.
//!
//! Each drive is a directory under a common root named after the device
//! (`{root}/{host:port}`), holding one file per key: `{drive_dir}/{key}`.

use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use scour_types::Device;
use tracing::debug;

use crate::error::StoreError;
use crate::traits::{Connector, KeyValueStore, in_range};

/// Upper bound on the heap preallocated for one range page.
const PAGE_RESERVE: usize = 4096;

/// A drive stored as a flat directory of key files.
///
/// Writes are atomic: data is written to a hidden temporary file first, then
/// renamed into place, so a reader never sees a half-written value.
///
/// This emulates a drive for tests and single-node setups. A directory has
/// no key order, so every [`KeyValueStore::get_key_range`] page scans the
/// whole directory. Only the requested page is held and sorted.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a drive rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Compute the file path for a key.
    ///
    /// Keys map directly to file names, so anything that would escape the
    /// drive directory or collide with temp files is rejected.
    fn key_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() || key.starts_with('.') || key.contains(['/', '\\', '\0']) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }
}

#[async_trait::async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let path = self.key_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        let path = self.key_path(key)?;
        let tmp_path = self.dir.join(format!(".{key}.tmp"));
        tokio::fs::write(&tmp_path, &value).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        debug!(key, path = %path.display(), size = value.len(), "stored key to file");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.key_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> Result<bool, StoreError> {
        let from_path = self.key_path(from)?;
        let to_path = self.key_path(to)?;
        match tokio::fs::rename(&from_path, &to_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn get_key_range(
        &self,
        start: &str,
        end: &str,
        start_inclusive: bool,
        max_keys: usize,
    ) -> Result<Vec<String>, StoreError> {
        if max_keys == 0 {
            return Ok(Vec::new());
        }
        // Keep only the page's worth of smallest keys while scanning.
        let mut page: BinaryHeap<String> = BinaryHeap::with_capacity(max_keys.min(PAGE_RESERVE));
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') || !in_range(&name, start, end, start_inclusive) {
                continue;
            }
            if page.len() < max_keys {
                page.push(name);
            } else if page.peek().is_some_and(|largest| name < *largest) {
                page.pop();
                page.push(name);
            }
        }
        Ok(page.into_sorted_vec())
    }
}

/// Connector that opens drives as directories under a common root.
///
/// A drive whose directory does not exist is unreachable; drives are never
/// created implicitly by connecting.
pub struct FileConnector {
    root: PathBuf,
}

impl FileConnector {
    /// Create a connector over `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Directory holding `device`'s keys.
    pub fn drive_dir(&self, device: &Device) -> PathBuf {
        self.root.join(&device.name)
    }
}

#[async_trait::async_trait]
impl Connector for FileConnector {
    async fn connect(&self, device: &Device) -> Result<Arc<dyn KeyValueStore>, StoreError> {
        let dir = self.drive_dir(device);
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(Arc::new(FileStore { dir })),
            Ok(_) => Err(StoreError::Connect {
                device: device.name.clone(),
                reason: format!("{} is not a directory", dir.display()),
            }),
            Err(e) => Err(StoreError::Connect {
                device: device.name.clone(),
                reason: e.to_string(),
            }),
        }
    }
}
