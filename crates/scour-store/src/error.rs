//! Error types for drive and object operations.

use std::time::Duration;

use scour_types::keys::HeadKeyError;
use scour_types::{DeviceParseError, MetadataError};

/// Errors that can occur while talking to a drive or reading an object.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested key or object does not exist (or is a tombstone).
    #[error("not found: {0}")]
    NotFound(String),

    /// No connection to the drive could be established.
    #[error("device {device} unavailable after {attempts} connect attempt(s)")]
    DeviceUnavailable {
        /// Device name.
        device: String,
        /// How many attempts were made.
        attempts: u32,
    },

    /// A single connect attempt failed.
    #[error("connect to {device} failed: {reason}")]
    Connect {
        /// Device name.
        device: String,
        /// What went wrong.
        reason: String,
    },

    /// A drive operation did not complete in time.
    #[error("{op} timed out after {after:?}")]
    Timeout {
        /// Operation name.
        op: &'static str,
        /// The deadline that elapsed.
        after: Duration,
    },

    /// The device name could not be resolved to an endpoint.
    #[error(transparent)]
    DeviceName(#[from] DeviceParseError),

    /// The key cannot be stored by this backend.
    #[error("invalid key {0:?}")]
    InvalidKey(String),

    /// A head key does not follow the object key layout.
    #[error(transparent)]
    HeadKey(#[from] HeadKeyError),

    /// Object metadata is missing a header or holds a bad value.
    #[error("bad metadata for {key}: {source}")]
    Metadata {
        /// Head key of the object.
        key: String,
        /// The underlying problem.
        source: MetadataError,
    },

    /// Object metadata is not valid JSON.
    #[error("metadata decode error: {0}")]
    Serde(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether this error means the device as a whole cannot be reached.
    pub fn is_device_unavailable(&self) -> bool {
        matches!(self, Self::DeviceUnavailable { .. } | Self::DeviceName(_))
    }
}
