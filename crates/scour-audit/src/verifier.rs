//! Streaming integrity verification of a single object.
//!
//! For each object, the verifier:
//! 1. Opens the head key. Gone (or a tombstone) → skipped, not a failure.
//! 2. Streams every chunk, feeding an MD5 digest and a byte counter, and
//!    paying for each chunk out of the sweep's byte budget.
//! 3. Size differs from `Content-Length` → quarantine.
//! 4. Digest differs from `ETag` → quarantine.
//!
//! Anything else that goes wrong is contained here and reported as
//! [`VerificationOutcome::Failed`]; it never escapes to the device scan.

use std::fmt;
use std::sync::Arc;

use md5::{Digest, Md5};
use scour_store::{KeyValueStore, ObjectFile, StoreError};
use scour_types::AuditLocation;
use tracing::{debug, error, warn};

use crate::error::AuditError;
use crate::shutdown::Shutdown;
use crate::stats::SweepStats;
use crate::throttle::RateBudget;

/// Why an object was not audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The object vanished between listing and audit.
    NotFound,
}

/// Why an object was quarantined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuarantineReason {
    /// Streamed size differs from `Content-Length`.
    SizeMismatch {
        /// Bytes actually read.
        actual: u64,
        /// `Content-Length`.
        expected: u64,
    },
    /// Streamed digest differs from `ETag`.
    EtagMismatch {
        /// Hex MD5 of the bytes read.
        actual: String,
        /// `ETag`, empty if absent.
        expected: String,
    },
}

impl QuarantineReason {
    /// Short machine-readable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SizeMismatch { .. } => "size-mismatch",
            Self::EtagMismatch { .. } => "etag-mismatch",
        }
    }
}

impl fmt::Display for QuarantineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of verifying one object.
#[derive(Debug)]
pub enum VerificationOutcome {
    /// Size and digest match the metadata.
    Success,
    /// Nothing to audit.
    Skipped(SkipReason),
    /// Corruption detected; the object was quarantined.
    Quarantined(QuarantineReason),
    /// The audit itself failed.
    Failed(AuditError),
}

impl VerificationOutcome {
    /// Whether this outcome counts towards the sweep's `success` counter.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::Skipped(_))
    }
}

/// Verifies objects against their recorded size and ETag.
pub struct IntegrityVerifier {
    max_bytes_per_second: f64,
}

impl IntegrityVerifier {
    /// Create a verifier reading at most `max_bytes_per_second`
    /// (non-positive means unlimited).
    pub fn new(max_bytes_per_second: f64) -> Self {
        Self {
            max_bytes_per_second,
        }
    }

    /// Verify the object at `location` over `conn`.
    ///
    /// Chunk reads are charged to `budget` and counted into `stats`. Never
    /// returns an error: failures come back as [`VerificationOutcome::Failed`].
    pub async fn verify(
        &self,
        conn: Arc<dyn KeyValueStore>,
        location: &AuditLocation,
        budget: &mut RateBudget,
        stats: &mut SweepStats,
        shutdown: &Shutdown,
    ) -> VerificationOutcome {
        match self.try_verify(conn, location, budget, stats, shutdown).await {
            Ok(outcome) => outcome,
            Err(AuditError::Interrupted) => VerificationOutcome::Failed(AuditError::Interrupted),
            Err(e) => {
                error!(
                    device = %location.device,
                    key = %location.head_key,
                    error = %e,
                    "unhandled error in object audit"
                );
                VerificationOutcome::Failed(e)
            }
        }
    }

    async fn try_verify(
        &self,
        conn: Arc<dyn KeyValueStore>,
        location: &AuditLocation,
        budget: &mut RateBudget,
        stats: &mut SweepStats,
        shutdown: &Shutdown,
    ) -> Result<VerificationOutcome, AuditError> {
        let file = match ObjectFile::open(conn, &location.head_key).await {
            Ok(file) => file,
            Err(StoreError::NotFound(_)) => {
                debug!(device = %location.device, key = %location.head_key, "object does not exist");
                return Ok(VerificationOutcome::Skipped(SkipReason::NotFound));
            }
            Err(e) => return Err(e.into()),
        };

        let metadata = file.metadata();
        let expected_size = metadata
            .content_length()
            .map_err(|source| AuditError::Metadata {
                key: location.head_key.clone(),
                source,
            })?;

        let mut digest = Md5::new();
        let mut size = 0u64;
        let mut reader = file.reader()?;
        while let Some(chunk) = reader.next_chunk().await? {
            let len = chunk.len() as u64;
            digest.update(&chunk);
            size += len;
            stats.record_bytes(len);

            let wait = budget.reserve(self.max_bytes_per_second, len);
            if !shutdown.sleep(wait).await {
                return Err(AuditError::Interrupted);
            }
        }

        if size != expected_size {
            warn!(
                device = %location.device,
                key = %location.head_key,
                actual = size,
                expected = expected_size,
                "found object with wrong size"
            );
            file.quarantine().await?;
            return Ok(VerificationOutcome::Quarantined(
                QuarantineReason::SizeMismatch {
                    actual: size,
                    expected: expected_size,
                },
            ));
        }

        let actual_etag = hex::encode(digest.finalize());
        let expected_etag = metadata.etag().unwrap_or_default();
        if actual_etag != expected_etag {
            warn!(
                device = %location.device,
                key = %location.head_key,
                actual = %actual_etag,
                expected = %expected_etag,
                "found object with wrong etag"
            );
            let expected = expected_etag.to_string();
            file.quarantine().await?;
            return Ok(VerificationOutcome::Quarantined(
                QuarantineReason::EtagMismatch {
                    actual: actual_etag,
                    expected,
                },
            ));
        }

        debug!(device = %location.device, key = %location.head_key, size, "object verified");
        Ok(VerificationOutcome::Success)
    }
}
