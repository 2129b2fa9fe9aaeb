//! Key layout for objects stored on a key-value drive.
//!
//! Keys use `.` to separate path segments. Since `'/'` is the byte right after
//! `'.'`, every key under a prefix `p` sorts in `[p + ".", p + "/")`, and every
//! key starting with `p` sorts in `[p, p + "/")`.
//!
//! ```text
//! objects[-N].<hashpath>.<timestamp><ext>.<nonce>        head key (JSON metadata)
//! chunks.<hashpath>.<nonce>.<index:032>                  body chunk, index from 1
//! quarantine.<timestamp>.<original key>                  quarantined key
//! ```

use std::fmt;

use crate::{PolicyIndex, Timestamp};

/// Inclusive start of the head-key range.
pub const OBJECTS_START: &str = "objects";
/// Exclusive end of the head-key range.
pub const OBJECTS_END: &str = "objects/";

/// Extension of a live object's head key.
pub const DATA_EXT: &str = ".data";
/// Extension of a tombstone's head key.
pub const TOMBSTONE_EXT: &str = ".ts";

/// `(start, end)` bounds covering every key under `marker.`.
pub fn key_range_markers(marker: &str) -> (String, String) {
    (format!("{marker}."), format!("{marker}/"))
}

/// Directory segment for a policy's head keys.
pub fn objects_dir(policy: PolicyIndex) -> String {
    if policy == 0 {
        OBJECTS_START.to_string()
    } else {
        format!("{OBJECTS_START}-{policy}")
    }
}

/// Head key for one version of an object.
pub fn object_key(
    policy: PolicyIndex,
    hashpath: &str,
    timestamp: Timestamp,
    extension: &str,
    nonce: &str,
) -> String {
    format!(
        "{}.{hashpath}.{timestamp}{extension}.{nonce}",
        objects_dir(policy)
    )
}

/// Key of body chunk `index` (1-based).
pub fn chunk_key(hashpath: &str, nonce: &str, index: u64) -> String {
    format!("chunks.{hashpath}.{nonce}.{index:032}")
}

/// Where `key` moves to when quarantined at `timestamp`.
pub fn quarantine_key(timestamp: Timestamp, key: &str) -> String {
    format!("quarantine.{timestamp}.{key}")
}

/// A parsed head key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadKey {
    /// Storage policy the object belongs to.
    pub policy: PolicyIndex,
    /// Hash of the object's name.
    pub hashpath: String,
    /// Version timestamp as it appears in the key.
    pub timestamp: String,
    /// `.data` or `.ts`.
    pub extension: String,
    /// Nonce shared with the chunk keys.
    pub nonce: String,
}

/// A head key did not match the expected layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed head key {0:?}")]
pub struct HeadKeyError(pub String);

impl HeadKey {
    /// Parse `objects[-N].<hashpath>.<timestamp><ext>.<nonce>`.
    pub fn parse(key: &str) -> Result<Self, HeadKeyError> {
        let err = || HeadKeyError(key.to_string());

        let (dir, rest) = key.split_once('.').ok_or_else(err)?;
        let policy = match dir.strip_prefix(OBJECTS_START).ok_or_else(err)? {
            "" => 0,
            suffix => suffix
                .strip_prefix('-')
                .and_then(|n| n.parse::<PolicyIndex>().ok())
                .ok_or_else(err)?,
        };

        let (hashpath, rest) = rest.split_once('.').ok_or_else(err)?;
        let (versioned, nonce) = rest.rsplit_once('.').ok_or_else(err)?;
        let (timestamp, ext) = versioned.rsplit_once('.').ok_or_else(err)?;

        if hashpath.is_empty() || timestamp.is_empty() || nonce.is_empty() {
            return Err(err());
        }

        Ok(Self {
            policy,
            hashpath: hashpath.to_string(),
            timestamp: timestamp.to_string(),
            extension: format!(".{ext}"),
            nonce: nonce.to_string(),
        })
    }

    /// Whether this key is a tombstone rather than live data.
    pub fn is_tombstone(&self) -> bool {
        self.extension == TOMBSTONE_EXT
    }

    /// Key of body chunk `index` (1-based) for this object version.
    pub fn chunk_key(&self, index: u64) -> String {
        chunk_key(&self.hashpath, &self.nonce, index)
    }
}

impl fmt::Display for HeadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}{}.{}",
            objects_dir(self.policy),
            self.hashpath,
            self.timestamp,
            self.extension,
            self.nonce
        )
    }
}
