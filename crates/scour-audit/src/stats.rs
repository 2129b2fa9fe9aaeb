//! Per-sweep audit counters.

use serde::Serialize;

use crate::auditor::DeviceOutcome;
use crate::verifier::VerificationOutcome;

/// Counters for one sweep.
///
/// A fresh value is created at the start of every sweep; counters only ever
/// grow while the sweep runs. Serializes with the dotted names monitoring
/// tooling expects (`device.success`, ...).
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    /// Head keys enumerated.
    pub found_objects: u64,
    /// Objects that verified clean or no longer existed.
    pub success: u64,
    /// Objects that were quarantined or could not be verified.
    pub failures: u64,
    /// Of `success`: objects gone between listing and audit.
    pub skipped: u64,
    /// Of `failures`: objects quarantined for a mismatch.
    pub quarantines: u64,
    /// Of `failures`: objects whose audit hit an unexpected error.
    pub errors: u64,
    /// Devices fully enumerated.
    #[serde(rename = "device.success")]
    pub device_success: u64,
    /// Devices that were unreachable or failed mid-enumeration.
    #[serde(rename = "device.failures")]
    pub device_failures: u64,
    /// Bytes read since the last progress report.
    pub bytes_processed: u64,
    /// Objects audited since the last progress report.
    pub files_processed: u64,
    /// Bytes read this sweep.
    pub total_bytes_processed: u64,
    /// Objects audited this sweep.
    pub total_files_processed: u64,
}

impl SweepStats {
    /// Count one verification result.
    pub fn record_object(&mut self, outcome: &VerificationOutcome) {
        match outcome {
            VerificationOutcome::Success => self.success += 1,
            VerificationOutcome::Skipped(_) => {
                self.success += 1;
                self.skipped += 1;
            }
            VerificationOutcome::Quarantined(_) => {
                self.failures += 1;
                self.quarantines += 1;
            }
            VerificationOutcome::Failed(_) => {
                self.failures += 1;
                self.errors += 1;
            }
        }
        self.files_processed += 1;
        self.total_files_processed += 1;
    }

    /// Count one device result. Interrupted devices are not counted.
    pub fn record_device(&mut self, outcome: &DeviceOutcome) {
        match outcome {
            DeviceOutcome::Success => self.device_success += 1,
            DeviceOutcome::Unavailable | DeviceOutcome::Failed(_) => self.device_failures += 1,
            DeviceOutcome::Interrupted => {}
        }
    }

    /// Count bytes streamed from an object body.
    pub fn record_bytes(&mut self, bytes: u64) {
        self.bytes_processed += bytes;
        self.total_bytes_processed += bytes;
    }

    /// Clear the progress-report window counters.
    pub fn reset_window(&mut self) {
        self.bytes_processed = 0;
        self.files_processed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuditError;
    use crate::verifier::{QuarantineReason, SkipReason};

    #[test]
    fn test_object_outcomes_split_into_success_and_failures() {
        let mut stats = SweepStats::default();
        stats.record_object(&VerificationOutcome::Success);
        stats.record_object(&VerificationOutcome::Skipped(SkipReason::NotFound));
        stats.record_object(&VerificationOutcome::Quarantined(QuarantineReason::SizeMismatch {
            actual: 1,
            expected: 2,
        }));
        stats.record_object(&VerificationOutcome::Failed(AuditError::Interrupted));

        assert_eq!(stats.success, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failures, 2);
        assert_eq!(stats.quarantines, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.total_files_processed, 4);
    }

    #[test]
    fn test_device_outcomes() {
        let mut stats = SweepStats::default();
        stats.record_device(&DeviceOutcome::Success);
        stats.record_device(&DeviceOutcome::Unavailable);
        stats.record_device(&DeviceOutcome::Interrupted);
        assert_eq!(stats.device_success, 1);
        assert_eq!(stats.device_failures, 1);
    }

    #[test]
    fn test_window_reset_keeps_totals() {
        let mut stats = SweepStats::default();
        stats.record_bytes(100);
        stats.record_object(&VerificationOutcome::Success);
        stats.reset_window();
        assert_eq!(stats.bytes_processed, 0);
        assert_eq!(stats.files_processed, 0);
        assert_eq!(stats.total_bytes_processed, 100);
        assert_eq!(stats.total_files_processed, 1);
    }

    #[test]
    fn test_serializes_dotted_device_names() {
        let json = serde_json::to_value(SweepStats::default()).unwrap();
        assert!(json.get("device.success").is_some());
        assert!(json.get("device.failures").is_some());
    }
}
