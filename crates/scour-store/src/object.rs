//! Objects stored on a key-value drive.
//!
//! An object version is a head key holding JSON-encoded [`ObjectMetadata`]
//! plus `X-Kinetic-Chunk-Count` chunk keys holding the body. See
//! [`scour_types::keys`] for the layout.

use std::sync::Arc;

use bytes::Bytes;
use md5::{Digest, Md5};
use scour_types::keys::{self, DATA_EXT, TOMBSTONE_EXT};
use scour_types::{
    CHUNK_COUNT, CHUNK_NONCE, DELETED, HeadKey, ObjectMetadata, PolicyIndex, Timestamp,
    X_TIMESTAMP,
};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::traits::KeyValueStore;

/// Default size of each body chunk written by [`ObjectWriter`].
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Page size used when sweeping chunk key ranges.
const RANGE_PAGE: usize = 800;

/// Hash an object name (`/account/container/object`) into its hashpath.
pub fn hash_path(name: &str) -> String {
    hex::encode(Md5::digest(name.as_bytes()))
}

/// An opened, live object version.
pub struct ObjectFile {
    conn: Arc<dyn KeyValueStore>,
    head_key: String,
    head: HeadKey,
    metadata: ObjectMetadata,
}

impl ObjectFile {
    /// Open the object whose head key is `head_key`.
    ///
    /// Returns [`StoreError::NotFound`] if the key is gone or the version is
    /// a tombstone.
    pub async fn open(conn: Arc<dyn KeyValueStore>, head_key: &str) -> Result<Self, StoreError> {
        let head = HeadKey::parse(head_key)?;
        let Some(blob) = conn.get(head_key).await? else {
            return Err(StoreError::NotFound(head_key.to_string()));
        };
        let metadata: ObjectMetadata = serde_json::from_slice(&blob)?;
        if head.is_tombstone() || metadata.is_deleted() {
            return Err(StoreError::NotFound(head_key.to_string()));
        }
        Ok(Self {
            conn,
            head_key: head_key.to_string(),
            head,
            metadata,
        })
    }

    /// The head key this object was opened from.
    pub fn head_key(&self) -> &str {
        &self.head_key
    }

    /// Stored metadata.
    pub fn metadata(&self) -> &ObjectMetadata {
        &self.metadata
    }

    /// Start streaming the body from the first chunk.
    pub fn reader(&self) -> Result<ObjectReader<'_>, StoreError> {
        let chunk_count = self
            .metadata
            .chunk_count()
            .map_err(|source| StoreError::Metadata {
                key: self.head_key.clone(),
                source,
            })?;
        Ok(ObjectReader {
            file: self,
            next_index: 1,
            chunk_count,
            missing_run: 0,
        })
    }

    /// Move the head key and every chunk key of this version out of the
    /// serving namespace, under `quarantine.<now>.`.
    ///
    /// Returns the number of keys moved. After this, [`ObjectFile::open`] on
    /// the same head key reports not found.
    pub async fn quarantine(&self) -> Result<usize, StoreError> {
        let stamp = Timestamp::now();
        let mut moved = 0usize;

        if self
            .conn
            .rename(&self.head_key, &keys::quarantine_key(stamp, &self.head_key))
            .await?
        {
            moved += 1;
        }

        // Sweep the chunk range rather than trusting the recorded count, so
        // stray chunks of a corrupt object go too.
        let (start, end) =
            keys::key_range_markers(&format!("chunks.{}.{}", self.head.hashpath, self.head.nonce));
        let mut cursor = start;
        let mut inclusive = true;
        loop {
            let page = self
                .conn
                .get_key_range(&cursor, &end, inclusive, RANGE_PAGE)
                .await?;
            for key in &page {
                if self.conn.rename(key, &keys::quarantine_key(stamp, key)).await? {
                    moved += 1;
                }
            }
            match page.last() {
                Some(last) if page.len() == RANGE_PAGE => {
                    cursor = last.clone();
                    inclusive = false;
                }
                _ => break,
            }
        }

        warn!(head_key = %self.head_key, moved, "object quarantined");
        Ok(moved)
    }
}

/// Consecutive missing chunk keys after which the body is treated as ended.
pub const MAX_MISSING_CHUNK_RUN: u64 = 1024;

/// Streams an object body chunk by chunk.
pub struct ObjectReader<'a> {
    file: &'a ObjectFile,
    next_index: u64,
    chunk_count: u64,
    missing_run: u64,
}

impl ObjectReader<'_> {
    /// Read the next chunk, or `None` once the body is exhausted.
    ///
    /// A chunk key missing from the drive reads as an empty chunk, so the
    /// body comes up short instead of the read failing outright. After
    /// [`MAX_MISSING_CHUNK_RUN`] missing keys in a row the body ends, which
    /// bounds the read when `X-Kinetic-Chunk-Count` is corrupt.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, StoreError> {
        if self.next_index > self.chunk_count || self.missing_run >= MAX_MISSING_CHUNK_RUN {
            return Ok(None);
        }
        let key = self.file.head.chunk_key(self.next_index);
        self.next_index += 1;
        match self.file.conn.get(&key).await? {
            Some(chunk) => {
                self.missing_run = 0;
                Ok(Some(chunk))
            }
            None => {
                self.missing_run += 1;
                if self.missing_run == MAX_MISSING_CHUNK_RUN {
                    warn!(
                        head_key = %self.file.head_key,
                        missing = self.missing_run,
                        "too many missing chunk keys, ending body"
                    );
                } else {
                    debug!(key, "chunk key missing");
                }
                Ok(Some(Bytes::new()))
            }
        }
    }
}

/// Writes a new object version: body chunks first, head key last.
pub struct ObjectWriter {
    conn: Arc<dyn KeyValueStore>,
    policy: PolicyIndex,
    hashpath: String,
    nonce: String,
    chunk_size: usize,
    buffer: Vec<u8>,
    chunks_written: u64,
}

impl ObjectWriter {
    /// Start writing an object with the given hashpath.
    pub fn new(conn: Arc<dyn KeyValueStore>, policy: PolicyIndex, hashpath: impl Into<String>) -> Self {
        Self {
            conn,
            policy,
            hashpath: hashpath.into(),
            nonce: uuid::Uuid::new_v4().to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            buffer: Vec::new(),
            chunks_written: 0,
        }
    }

    /// Override the chunk size.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Append body data, flushing whole chunks to the drive.
    pub async fn write(&mut self, data: &[u8]) -> Result<(), StoreError> {
        self.buffer.extend_from_slice(data);
        while self.buffer.len() >= self.chunk_size {
            let rest = self.buffer.split_off(self.chunk_size);
            let chunk = std::mem::replace(&mut self.buffer, rest);
            self.flush_chunk(chunk).await?;
        }
        Ok(())
    }

    /// Flush the tail chunk and write the head key.
    ///
    /// Chunk bookkeeping headers and `X-Timestamp` are filled in; the caller
    /// supplies `Content-Length`, `ETag` and anything else. Returns the head
    /// key.
    pub async fn commit(
        mut self,
        mut metadata: ObjectMetadata,
        timestamp: Timestamp,
    ) -> Result<String, StoreError> {
        if !self.buffer.is_empty() {
            let chunk = std::mem::take(&mut self.buffer);
            self.flush_chunk(chunk).await?;
        }
        metadata.insert(CHUNK_COUNT, self.chunks_written.to_string());
        metadata.insert(CHUNK_NONCE, self.nonce.clone());
        metadata.insert(X_TIMESTAMP, timestamp.to_string());

        let head_key = keys::object_key(self.policy, &self.hashpath, timestamp, DATA_EXT, &self.nonce);
        let blob = serde_json::to_vec(&metadata)?;
        self.conn.put(&head_key, Bytes::from(blob)).await?;
        debug!(head_key, chunks = self.chunks_written, "object committed");
        Ok(head_key)
    }

    async fn flush_chunk(&mut self, chunk: Vec<u8>) -> Result<(), StoreError> {
        self.chunks_written += 1;
        let key = keys::chunk_key(&self.hashpath, &self.nonce, self.chunks_written);
        self.conn.put(&key, Bytes::from(chunk)).await
    }
}

/// Delete an object: write a tombstone head key and remove every older
/// version of the same hashpath along with its chunks.
///
/// Returns the tombstone's head key.
pub async fn write_tombstone(
    conn: &Arc<dyn KeyValueStore>,
    policy: PolicyIndex,
    hashpath: &str,
    timestamp: Timestamp,
) -> Result<String, StoreError> {
    let nonce = uuid::Uuid::new_v4().to_string();
    let ts_key = keys::object_key(policy, hashpath, timestamp, TOMBSTONE_EXT, &nonce);

    let mut metadata = ObjectMetadata::new();
    metadata.insert(X_TIMESTAMP, timestamp.to_string());
    metadata.insert(DELETED, "true");
    conn.put(&ts_key, Bytes::from(serde_json::to_vec(&metadata)?))
        .await?;

    let (start, end) = keys::key_range_markers(&format!("{}.{hashpath}", keys::objects_dir(policy)));
    let older = conn.get_key_range(&start, &end, true, usize::MAX).await?;
    for head_key in older.into_iter().filter(|k| *k != ts_key) {
        let head = HeadKey::parse(&head_key)?;
        let (chunk_start, chunk_end) =
            keys::key_range_markers(&format!("chunks.{hashpath}.{}", head.nonce));
        for chunk in conn
            .get_key_range(&chunk_start, &chunk_end, true, usize::MAX)
            .await?
        {
            conn.delete(&chunk).await?;
        }
        conn.delete(&head_key).await?;
    }

    debug!(ts_key, "tombstone written");
    Ok(ts_key)
}
