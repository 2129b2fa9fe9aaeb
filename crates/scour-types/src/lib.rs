//! Shared types for Scour.
//!
//! This crate defines the types passed between the storage layer and the
//! audit engine: drive addressing ([`Device`]), audit work items
//! ([`AuditLocation`]), stored object metadata ([`ObjectMetadata`]), and the
//! key layout objects use on a key-value drive ([`keys`], [`HeadKey`]).

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub mod keys;

pub use keys::HeadKey;

/// Storage policy index. Policy `0` is the legacy/default policy.
pub type PolicyIndex = u32;

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

/// A key-value drive reachable over the network.
///
/// Drives are named by their endpoint (`"host:port"`), so the name is all
/// that is needed to resolve where to connect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Device {
    /// Device name as it appears in the topology (`"host:port"`).
    pub name: String,
    /// Host part of the endpoint.
    pub host: String,
    /// Port part of the endpoint.
    pub port: u16,
}

/// A device name could not be resolved to an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid device name {name:?}: {reason}")]
pub struct DeviceParseError {
    /// The offending name.
    pub name: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

impl Device {
    /// Parse a `"host:port"` device name.
    ///
    /// The split happens on the last `:` so bracketed IPv6 hosts work.
    pub fn parse(name: &str) -> Result<Self, DeviceParseError> {
        let err = |reason| DeviceParseError {
            name: name.to_string(),
            reason,
        };
        let (host, port) = name.rsplit_once(':').ok_or_else(|| err("missing port"))?;
        if host.is_empty() {
            return Err(err("empty host"));
        }
        let port = port.parse::<u16>().map_err(|_| err("port is not a u16"))?;
        Ok(Self {
            name: name.to_string(),
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One object to audit: the device it lives on and its head key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuditLocation {
    /// Device name.
    pub device: String,
    /// Head key of the object on that device.
    pub head_key: String,
}

impl AuditLocation {
    /// Create a location from a device name and head key.
    pub fn new(device: impl Into<String>, head_key: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            head_key: head_key.into(),
        }
    }
}

impl fmt::Display for AuditLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.head_key)
    }
}

// ---------------------------------------------------------------------------
// Object metadata
// ---------------------------------------------------------------------------

/// Metadata header: expected body size in bytes.
pub const CONTENT_LENGTH: &str = "Content-Length";
/// Metadata header: expected lowercase hex MD5 of the body.
pub const ETAG: &str = "ETag";
/// Metadata header: object timestamp.
pub const X_TIMESTAMP: &str = "X-Timestamp";
/// Metadata header: number of chunk keys holding the body.
pub const CHUNK_COUNT: &str = "X-Kinetic-Chunk-Count";
/// Metadata header: nonce shared by the head key and its chunk keys.
pub const CHUNK_NONCE: &str = "X-Kinetic-Chunk-Nonce";
/// Metadata marker set on tombstones.
pub const DELETED: &str = "deleted";

/// A metadata header is missing or does not parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    /// A required header is absent.
    #[error("missing metadata header {0}")]
    Missing(&'static str),

    /// A header is present but is not a valid value.
    #[error("invalid metadata header {header}: {value:?}")]
    Invalid {
        /// Header name.
        header: &'static str,
        /// The raw value.
        value: String,
    },
}

/// Header name → value mapping stored alongside every object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectMetadata(BTreeMap<String, String>);

impl ObjectMetadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a header.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.0.get(header).map(String::as_str)
    }

    /// Set a header, returning the previous value.
    pub fn insert(&mut self, header: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(header.into(), value.into())
    }

    /// Iterate all headers in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Expected body size from `Content-Length`.
    pub fn content_length(&self) -> Result<u64, MetadataError> {
        self.parse_u64(CONTENT_LENGTH)
    }

    /// Expected body digest from `ETag`, if recorded.
    pub fn etag(&self) -> Option<&str> {
        self.get(ETAG)
    }

    /// Number of chunk keys holding the body. Absent means an empty body.
    pub fn chunk_count(&self) -> Result<u64, MetadataError> {
        match self.get(CHUNK_COUNT) {
            None => Ok(0),
            Some(_) => self.parse_u64(CHUNK_COUNT),
        }
    }

    /// Nonce linking the head key to its chunk keys.
    pub fn chunk_nonce(&self) -> Option<&str> {
        self.get(CHUNK_NONCE)
    }

    /// Whether this metadata marks a deleted object.
    pub fn is_deleted(&self) -> bool {
        matches!(self.get(DELETED), Some(v) if v.eq_ignore_ascii_case("true"))
    }

    fn parse_u64(&self, header: &'static str) -> Result<u64, MetadataError> {
        let raw = self.get(header).ok_or(MetadataError::Missing(header))?;
        raw.trim().parse::<u64>().map_err(|_| MetadataError::Invalid {
            header,
            value: raw.to_string(),
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ObjectMetadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Object timestamp with 10µs resolution.
///
/// Renders as `"SSSSSSSSSS.FFFFF"` (16 characters, zero padded) so that
/// lexical key order matches chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Ticks per second.
    const SCALE: u64 = 100_000;

    /// The current wall-clock time.
    pub fn now() -> Self {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(elapsed.as_secs() * Self::SCALE + u64::from(elapsed.subsec_micros() / 10))
    }

    /// Build a timestamp from whole seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self(secs * Self::SCALE)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:010}.{:05}", self.0 / Self::SCALE, self.0 % Self::SCALE)
    }
}
