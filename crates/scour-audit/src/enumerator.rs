//! Device and object enumeration for a sweep.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use scour_store::{KeyValueStore, StoreError};
use scour_types::keys::{OBJECTS_END, OBJECTS_START};
use tracing::{debug, error};

use crate::topology::TopologyProvider;

/// Default number of keys fetched per range request.
pub const DEFAULT_PAGE_SIZE: usize = 800;

/// Resolves the set of devices a sweep should audit.
pub struct DeviceEnumerator {
    topology: Arc<dyn TopologyProvider>,
}

impl DeviceEnumerator {
    /// Create an enumerator over `topology`.
    pub fn new(topology: Arc<dyn TopologyProvider>) -> Self {
        Self { topology }
    }

    /// Device names to audit.
    ///
    /// A non-empty `overrides` list is used as-is (deduplicated). Otherwise
    /// the union of every policy's object ring devices is returned. A policy
    /// whose ring cannot be read is logged and skipped.
    pub fn enumerate(&self, overrides: &[String]) -> BTreeSet<String> {
        let overrides: BTreeSet<String> = overrides
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        if !overrides.is_empty() {
            return overrides;
        }

        let mut devices = BTreeSet::new();
        for policy in self.topology.policies() {
            match self.topology.object_ring_devices(policy) {
                Ok(slots) => {
                    devices.extend(
                        slots
                            .into_iter()
                            .flatten()
                            .map(|device| device.name)
                            .filter(|name| !name.is_empty()),
                    );
                }
                Err(e) => {
                    error!(policy, error = %e, "failed to load object ring");
                }
            }
        }
        devices
    }
}

/// Lazily lists the head keys stored on one drive.
///
/// Walks `["objects", "objects/")` a page at a time. Finite and not
/// restartable: a new scanner starts over from the beginning.
pub struct ObjectScanner {
    conn: Arc<dyn KeyValueStore>,
    page_size: usize,
    buffered: VecDeque<String>,
    cursor: String,
    inclusive: bool,
    exhausted: bool,
}

impl ObjectScanner {
    /// Start scanning the drive behind `conn`.
    pub fn new(conn: Arc<dyn KeyValueStore>, page_size: usize) -> Self {
        Self {
            conn,
            page_size: page_size.max(1),
            buffered: VecDeque::new(),
            cursor: OBJECTS_START.to_string(),
            inclusive: true,
            exhausted: false,
        }
    }

    /// The next head key, or `None` at the end of the range.
    pub async fn next(&mut self) -> Result<Option<String>, StoreError> {
        if self.buffered.is_empty() && !self.exhausted {
            self.fetch_page().await?;
        }
        Ok(self.buffered.pop_front())
    }

    async fn fetch_page(&mut self) -> Result<(), StoreError> {
        let page = self
            .conn
            .get_key_range(&self.cursor, OBJECTS_END, self.inclusive, self.page_size)
            .await?;
        debug!(cursor = %self.cursor, keys = page.len(), "fetched head key page");

        if page.len() < self.page_size {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.cursor = last.clone();
            self.inclusive = false;
        }
        self.buffered.extend(page);
        Ok(())
    }
}
