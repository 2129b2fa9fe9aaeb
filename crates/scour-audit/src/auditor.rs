//! One full audit pass over every device.

use std::sync::Arc;

use scour_store::{ConnectionManager, KeyValueStore};
use scour_types::{AuditLocation, Device};
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::enumerator::{DEFAULT_PAGE_SIZE, DeviceEnumerator, ObjectScanner};
use crate::error::AuditError;
use crate::shutdown::Shutdown;
use crate::stats::SweepStats;
use crate::throttle::RateBudget;
use crate::verifier::{IntegrityVerifier, VerificationOutcome};

/// Tunables for a sweep.
#[derive(Debug, Clone)]
pub struct AuditorConfig {
    /// Byte read ceiling (non-positive = unlimited).
    pub max_bytes_per_second: f64,
    /// Object audit ceiling (non-positive = unlimited).
    pub max_files_per_second: f64,
    /// Keys requested per range listing.
    pub scan_page_size: usize,
    /// How often progress is logged during a sweep.
    pub log_interval: Duration,
}

impl Default for AuditorConfig {
    fn default() -> Self {
        Self {
            max_bytes_per_second: 10_000_000.0,
            max_files_per_second: 20.0,
            scan_page_size: DEFAULT_PAGE_SIZE,
            log_interval: Duration::from_secs(3600),
        }
    }
}

/// How auditing one device ended.
#[derive(Debug)]
pub enum DeviceOutcome {
    /// Every head key was enumerated.
    Success,
    /// No connection could be established.
    Unavailable,
    /// Enumeration broke off part way.
    Failed(AuditError),
    /// Shutdown was requested mid-device.
    Interrupted,
}

/// Result of one sweep.
#[derive(Debug)]
pub struct SweepSummary {
    /// Counters accumulated during the sweep.
    pub stats: SweepStats,
    /// Devices that were attempted.
    pub devices: usize,
    /// Wall-clock duration of the sweep.
    pub elapsed: Duration,
    /// Whether the sweep stopped early for shutdown.
    pub interrupted: bool,
}

/// Walks devices and verifies every object on them.
///
/// Holds no per-sweep state: each [`ObjectAuditor::run_once`] starts from
/// fresh counters and rate budgets.
pub struct ObjectAuditor {
    connections: Arc<ConnectionManager>,
    devices: DeviceEnumerator,
    verifier: IntegrityVerifier,
    config: AuditorConfig,
}

/// Mutable state owned by one sweep.
struct SweepState {
    stats: SweepStats,
    bytes: RateBudget,
    files: RateBudget,
    last_report: Instant,
}

impl ObjectAuditor {
    /// Create an auditor.
    pub fn new(
        connections: Arc<ConnectionManager>,
        devices: DeviceEnumerator,
        config: AuditorConfig,
    ) -> Self {
        Self {
            connections,
            devices,
            verifier: IntegrityVerifier::new(config.max_bytes_per_second),
            config,
        }
    }

    /// The sweep tunables.
    pub fn config(&self) -> &AuditorConfig {
        &self.config
    }

    /// Audit every device once.
    ///
    /// `overrides`, if non-empty, replaces the topology's device list.
    /// Device and object failures are counted, never propagated.
    pub async fn run_once(&self, overrides: &[String], shutdown: &Shutdown) -> SweepSummary {
        let started = Instant::now();
        let devices = self.devices.enumerate(overrides);
        info!(devices = devices.len(), "starting object audit sweep");

        let mut state = SweepState {
            stats: SweepStats::default(),
            bytes: RateBudget::new(),
            files: RateBudget::new(),
            last_report: started,
        };

        let mut interrupted = false;
        for name in &devices {
            if shutdown.is_triggered() {
                interrupted = true;
                break;
            }
            let outcome = self.audit_device(name, &mut state, shutdown).await;
            state.stats.record_device(&outcome);
            if matches!(outcome, DeviceOutcome::Interrupted) {
                interrupted = true;
                break;
            }
        }

        let elapsed = started.elapsed();
        let stats = state.stats;
        info!(
            elapsed_secs = elapsed.as_secs_f64(),
            interrupted,
            found_objects = stats.found_objects,
            success = stats.success,
            failures = stats.failures,
            quarantines = stats.quarantines,
            device_success = stats.device_success,
            device_failures = stats.device_failures,
            bytes = stats.total_bytes_processed,
            "finished object audit sweep"
        );

        SweepSummary {
            stats,
            devices: devices.len(),
            elapsed,
            interrupted,
        }
    }

    async fn audit_device(
        &self,
        name: &str,
        state: &mut SweepState,
        shutdown: &Shutdown,
    ) -> DeviceOutcome {
        let device = match Device::parse(name) {
            Ok(device) => device,
            Err(e) => {
                warn!(device = %name, error = %e, "unable to connect to device");
                return DeviceOutcome::Unavailable;
            }
        };

        let conn = match self.connections.get_connection(&device).await {
            Ok(conn) => conn,
            Err(e) if e.is_device_unavailable() => {
                warn!(device = %name, error = %e, "unable to connect to device");
                return DeviceOutcome::Unavailable;
            }
            Err(e) => {
                error!(device = %name, error = %e, "failed to open device");
                return DeviceOutcome::Failed(e.into());
            }
        };

        debug!(device = %name, "auditing device");
        match self.scan_device(name, conn, state, shutdown).await {
            Ok(()) => DeviceOutcome::Success,
            Err(AuditError::Interrupted) => DeviceOutcome::Interrupted,
            Err(e) => {
                error!(device = %name, error = %e, "device audit aborted");
                self.connections.mark_faulted(name).await;
                DeviceOutcome::Failed(e)
            }
        }
    }

    async fn scan_device(
        &self,
        name: &str,
        conn: Arc<dyn KeyValueStore>,
        state: &mut SweepState,
        shutdown: &Shutdown,
    ) -> Result<(), AuditError> {
        let mut scanner = ObjectScanner::new(conn.clone(), self.config.scan_page_size);
        while let Some(head_key) = scanner.next().await? {
            if shutdown.is_triggered() {
                return Err(AuditError::Interrupted);
            }
            state.stats.found_objects += 1;

            let location = AuditLocation::new(name, head_key);
            let outcome = self
                .verifier
                .verify(
                    conn.clone(),
                    &location,
                    &mut state.bytes,
                    &mut state.stats,
                    shutdown,
                )
                .await;
            if matches!(outcome, VerificationOutcome::Failed(AuditError::Interrupted)) {
                return Err(AuditError::Interrupted);
            }
            state.stats.record_object(&outcome);

            let wait = state.files.reserve(self.config.max_files_per_second, 1);
            if !shutdown.sleep(wait).await {
                return Err(AuditError::Interrupted);
            }
            self.maybe_log_progress(state);
        }
        Ok(())
    }

    fn maybe_log_progress(&self, state: &mut SweepState) {
        let now = Instant::now();
        let window = now.duration_since(state.last_report);
        if window < self.config.log_interval {
            return;
        }
        let secs = window.as_secs_f64().max(f64::EPSILON);
        info!(
            files_per_second = state.stats.files_processed as f64 / secs,
            bytes_per_second = state.stats.bytes_processed as f64 / secs,
            total_files = state.stats.total_files_processed,
            total_bytes = state.stats.total_bytes_processed,
            quarantines = state.stats.quarantines,
            errors = state.stats.errors,
            "object audit progress"
        );
        state.stats.reset_window();
        state.last_report = now;
    }
}
