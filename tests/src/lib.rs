//! Shared test harness for Scour integration tests.
//!
//! Provides [`TestNode`] — a node whose drives are directories under a
//! temporary root, served through the same [`FileConnector`] the daemon
//! uses.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use md5::{Digest, Md5};
use scour_audit::{AuditorConfig, DeviceEnumerator, ObjectAuditor, StaticTopology};
use scour_store::{
    ConnectionConfig, ConnectionManager, FileConnector, FileStore, KeyValueStore, ObjectWriter,
    hash_path,
};
use scour_types::{CONTENT_LENGTH, ETAG, HeadKey, ObjectMetadata, PolicyIndex, Timestamp};
use tempfile::TempDir;

/// Chunk size used for test objects, small enough to get multi-chunk bodies.
pub const TEST_CHUNK_SIZE: usize = 64;

/// A storage node with file-backed drives in a temp directory.
pub struct TestNode {
    dir: TempDir,
    devices: Vec<(PolicyIndex, String)>,
}

impl TestNode {
    /// An empty node.
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
            devices: Vec::new(),
        }
    }

    /// Root directory holding the drives.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file under the temp root (not a drive).
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Create a drive named `host:port` in `policy`'s ring and return a
    /// direct handle to it.
    pub fn add_drive(&mut self, policy: PolicyIndex, name: &str) -> Arc<dyn KeyValueStore> {
        self.devices.push((policy, name.to_string()));
        self.drive(name)
    }

    /// Register a ring slot for a drive that does not exist on disk.
    pub fn add_missing_drive(&mut self, policy: PolicyIndex, name: &str) {
        self.devices.push((policy, name.to_string()));
    }

    /// Direct handle to an existing drive.
    pub fn drive(&self, name: &str) -> Arc<dyn KeyValueStore> {
        Arc::new(FileStore::new(self.root().join(name)).expect("open drive"))
    }

    /// Build an auditor over this node's drives.
    ///
    /// Connects fail fast so unreachable drives do not slow tests down.
    pub fn auditor(&self, config: AuditorConfig) -> Arc<ObjectAuditor> {
        let mut rings: Vec<(PolicyIndex, Vec<String>)> = Vec::new();
        for (policy, name) in &self.devices {
            match rings.iter_mut().find(|(p, _)| p == policy) {
                Some((_, names)) => names.push(name.clone()),
                None => rings.push((*policy, vec![name.clone()])),
            }
        }
        let topology = StaticTopology::new(rings).expect("valid topology");
        let connections = Arc::new(ConnectionManager::new(
            Arc::new(FileConnector::new(self.root())),
            ConnectionConfig {
                connect_retry: 2,
                retry_delay: Duration::from_millis(1),
                ..ConnectionConfig::default()
            },
        ));
        Arc::new(ObjectAuditor::new(
            connections,
            DeviceEnumerator::new(Arc::new(topology)),
            config,
        ))
    }
}

impl Default for TestNode {
    fn default() -> Self {
        Self::new()
    }
}

/// Auditor settings with rate limiting disabled.
pub fn unlimited() -> AuditorConfig {
    AuditorConfig {
        max_bytes_per_second: 0.0,
        max_files_per_second: 0.0,
        ..AuditorConfig::default()
    }
}

/// Store `body` under object `name` with correct metadata. Returns the head key.
pub async fn put_object(
    drive: &Arc<dyn KeyValueStore>,
    policy: PolicyIndex,
    name: &str,
    body: &[u8],
) -> String {
    let metadata: ObjectMetadata = [
        (CONTENT_LENGTH, body.len().to_string()),
        (ETAG, hex::encode(Md5::digest(body))),
    ]
    .into_iter()
    .collect();
    let mut writer =
        ObjectWriter::new(drive.clone(), policy, hash_path(name)).chunk_size(TEST_CHUNK_SIZE);
    writer.write(body).await.expect("write body");
    writer
        .commit(metadata, Timestamp::now())
        .await
        .expect("commit object")
}

/// Overwrite chunk `index` (1-based) of the object at `head_key`.
pub async fn overwrite_chunk(
    drive: &Arc<dyn KeyValueStore>,
    head_key: &str,
    index: u64,
    data: &'static [u8],
) {
    let head = HeadKey::parse(head_key).expect("valid head key");
    drive
        .put(&head.chunk_key(index), Bytes::from_static(data))
        .await
        .expect("overwrite chunk");
}

/// Delete chunk `index` (1-based) of the object at `head_key`.
pub async fn drop_chunk(drive: &Arc<dyn KeyValueStore>, head_key: &str, index: u64) {
    let head = HeadKey::parse(head_key).expect("valid head key");
    drive
        .delete(&head.chunk_key(index))
        .await
        .expect("delete chunk");
}

/// All keys on `drive` starting with `prefix`.
pub async fn keys_with_prefix(drive: &Arc<dyn KeyValueStore>, prefix: &str) -> Vec<String> {
    let (start, end) = (prefix.to_string(), format!("{prefix}\u{10ffff}"));
    drive
        .get_key_range(&start, &end, true, usize::MAX)
        .await
        .expect("list keys")
}

/// Deterministic, non-repeating test data.
pub fn test_data(size: usize, seed: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut state: u32 = 0xDEAD_BEEF ^ seed;
    for _ in 0..size {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        data.push((state >> 16) as u8);
    }
    data
}
