//! Key-value drive access and the object layout built on top of it.
//!
//! This crate defines the [`KeyValueStore`] and [`Connector`] traits for
//! talking to drives, along with:
//!
//! - [`MemoryStore`] / [`MemoryConnector`] — in-memory drives, for tests.
//! - [`FileStore`] / [`FileConnector`] — drives emulated as directories.
//! - [`ConnectionManager`] — connect retries, per-operation timeouts, pooling.
//! - [`ObjectFile`] / [`ObjectWriter`] — objects as a head key plus chunk keys,
//!   including quarantine.

mod error;
mod file_store;
mod memory_store;
pub mod object;
mod pool;
mod traits;

pub use error::StoreError;
pub use file_store::{FileConnector, FileStore};
pub use memory_store::{MemoryConnector, MemoryStore};
pub use object::{
    MAX_MISSING_CHUNK_RUN, ObjectFile, ObjectReader, ObjectWriter, hash_path, write_tombstone,
};
pub use pool::{ConnectionConfig, ConnectionManager};
pub use traits::{Connector, KeyValueStore};
