//! In-memory drive backend.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use scour_types::Device;
use tracing::debug;

use crate::error::StoreError;
use crate::traits::{Connector, KeyValueStore, in_range};

/// In-memory drive backed by a `RwLock<BTreeMap>`.
///
/// Useful for testing. Keys are kept sorted so range queries behave like a
/// real drive's.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Bytes>>,
    renames: AtomicU64,
}

impl MemoryStore {
    /// Create an empty drive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys stored.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Whether the drive holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys starting with `prefix`, in order.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let map = self.entries.read().expect("lock poisoned");
        map.range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Total successful renames performed against this drive.
    pub fn rename_count(&self) -> u64 {
        self.renames.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        let mut map = self.entries.write().expect("lock poisoned");
        debug!(key, size = value.len(), "storing key in memory");
        map.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut map = self.entries.write().expect("lock poisoned");
        Ok(map.remove(key).is_some())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<bool, StoreError> {
        let mut map = self.entries.write().expect("lock poisoned");
        match map.remove(from) {
            Some(value) => {
                map.insert(to.to_string(), value);
                self.renames.fetch_add(1, Ordering::Relaxed);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_key_range(
        &self,
        start: &str,
        end: &str,
        start_inclusive: bool,
        max_keys: usize,
    ) -> Result<Vec<String>, StoreError> {
        let map = self.entries.read().expect("lock poisoned");
        let lower = if start_inclusive {
            Bound::Included(start)
        } else {
            Bound::Excluded(start)
        };
        Ok(map
            .range::<str, _>((lower, Bound::Unbounded))
            .map(|(k, _)| k)
            .take_while(|k| in_range(k, start, end, start_inclusive))
            .take(max_keys)
            .cloned()
            .collect())
    }
}

/// Connector over a set of named [`MemoryStore`] drives.
///
/// Drives can be marked down to simulate connection failures.
#[derive(Default)]
pub struct MemoryConnector {
    drives: RwLock<HashMap<String, Arc<MemoryStore>>>,
    down: RwLock<HashSet<String>>,
    connects: AtomicU64,
}

impl MemoryConnector {
    /// Create a connector with no drives.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a drive under `name` (`"host:port"`), returning it.
    pub fn add_drive(&self, name: &str) -> Arc<MemoryStore> {
        let drive = Arc::new(MemoryStore::new());
        self.drives
            .write()
            .expect("lock poisoned")
            .insert(name.to_string(), drive.clone());
        drive
    }

    /// Look up a registered drive.
    pub fn drive(&self, name: &str) -> Option<Arc<MemoryStore>> {
        self.drives.read().expect("lock poisoned").get(name).cloned()
    }

    /// Make connects to `name` fail (`down == true`) or succeed again.
    pub fn set_down(&self, name: &str, down: bool) {
        let mut set = self.down.write().expect("lock poisoned");
        if down {
            set.insert(name.to_string());
        } else {
            set.remove(name);
        }
    }

    /// Total connect attempts made through this connector.
    pub fn connect_count(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, device: &Device) -> Result<Arc<dyn KeyValueStore>, StoreError> {
        self.connects.fetch_add(1, Ordering::Relaxed);
        if self.down.read().expect("lock poisoned").contains(&device.name) {
            return Err(StoreError::Connect {
                device: device.name.clone(),
                reason: "drive is down".into(),
            });
        }
        match self.drive(&device.name) {
            Some(drive) => Ok(drive),
            None => Err(StoreError::Connect {
                device: device.name.clone(),
                reason: "no such drive".into(),
            }),
        }
    }
}
