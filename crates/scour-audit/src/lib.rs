//! Background integrity auditing for objects stored on key-value drives.
//!
//! This crate provides:
//!
//! - [`ObjectAuditor`] — walks every device and verifies each object once.
//! - [`IntegrityVerifier`] — streams one object, checks size and MD5 against
//!   its metadata, and quarantines it on mismatch.
//! - [`SweepScheduler`] — repeats sweeps on an interval and reports them.
//! - [`DeviceEnumerator`] / [`ObjectScanner`] — what to audit.
//! - [`RateBudget`] — keeps audit I/O under a bytes/files per second ceiling.
//! - [`ReconCache`] — the JSON file monitoring reads sweep times from.

pub mod auditor;
pub mod enumerator;
pub mod error;
pub mod recon;
pub mod scheduler;
pub mod shutdown;
pub mod stats;
pub mod throttle;
pub mod topology;
pub mod verifier;

pub use auditor::{AuditorConfig, DeviceOutcome, ObjectAuditor, SweepSummary};
pub use enumerator::{DeviceEnumerator, ObjectScanner};
pub use error::AuditError;
pub use recon::{MemorySink, OBJECT_AUDIT_SWEEP, ReconCache, ReportSink};
pub use scheduler::SweepScheduler;
pub use shutdown::Shutdown;
pub use stats::SweepStats;
pub use throttle::RateBudget;
pub use topology::{StaticTopology, TopologyProvider};
pub use verifier::{IntegrityVerifier, QuarantineReason, SkipReason, VerificationOutcome};
