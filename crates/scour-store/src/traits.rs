//! Core traits for talking to key-value drives.

use std::sync::Arc;

use bytes::Bytes;
use scour_types::Device;

use crate::error::StoreError;

/// A connection to one key-value drive.
///
/// Keys are ordered byte-wise. All implementations must be `Send + Sync` for
/// use across async tasks; values are passed as [`Bytes`] so chunk payloads
/// can be streamed without copying.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Retrieve a value. Returns `None` if the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Store a value, replacing any existing one.
    async fn put(&self, key: &str, value: Bytes) -> Result<(), StoreError>;

    /// Delete a key. Returns `false` if it did not exist.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Move a value to a new key. Returns `false` if `from` did not exist.
    async fn rename(&self, from: &str, to: &str) -> Result<bool, StoreError>;

    /// List up to `max_keys` keys in `[start, end)` in ascending order.
    ///
    /// With `start_inclusive == false` the range becomes `(start, end)`,
    /// which is how callers page past the last key they have seen.
    async fn get_key_range(
        &self,
        start: &str,
        end: &str,
        start_inclusive: bool,
        max_keys: usize,
    ) -> Result<Vec<String>, StoreError>;
}

/// Establishes connections to drives.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection to `device`.
    async fn connect(&self, device: &Device) -> Result<Arc<dyn KeyValueStore>, StoreError>;
}

/// Shared range filter used by the in-tree backends.
pub(crate) fn in_range(key: &str, start: &str, end: &str, start_inclusive: bool) -> bool {
    let after_start = if start_inclusive {
        key >= start
    } else {
        key > start
    };
    after_start && key < end
}
