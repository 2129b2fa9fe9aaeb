//! Error types for audit operations.

use std::path::PathBuf;

use scour_store::StoreError;
use scour_types::{DeviceParseError, MetadataError};

/// Errors that can occur while auditing.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// Failed to talk to a drive or read an object.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Object metadata is missing a header or holds a bad value.
    #[error("bad metadata for {key}: {source}")]
    Metadata {
        /// Head key of the object.
        key: String,
        /// The underlying problem.
        source: MetadataError,
    },

    /// A topology entry does not name a usable device.
    #[error("topology error: {0}")]
    Topology(#[from] DeviceParseError),

    /// The recon cache could not be read or written.
    #[error("recon cache {path}: {source}")]
    Recon {
        /// Path of the cache file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The recon cache could not be encoded.
    #[error("recon encode error: {0}")]
    ReconEncode(#[from] serde_json::Error),

    /// Work stopped because shutdown was requested.
    #[error("interrupted by shutdown")]
    Interrupted,
}
