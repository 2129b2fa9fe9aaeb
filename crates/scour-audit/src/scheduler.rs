//! Sweep scheduler: runs the auditor on a fixed cadence and reports each
//! completed sweep to recon.

use std::sync::Arc;

use rand::Rng;
use tokio::time::Duration;
use tracing::{error, info};

use crate::auditor::{ObjectAuditor, SweepSummary};
use crate::recon::{OBJECT_AUDIT_SWEEP, ReportSink};
use crate::shutdown::Shutdown;

/// Default minimum spacing between sweep starts.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Drives [`ObjectAuditor`] sweeps until shutdown.
pub struct SweepScheduler {
    auditor: Arc<ObjectAuditor>,
    sink: Arc<dyn ReportSink>,
    interval: Duration,
    overrides: Vec<String>,
    shutdown: Shutdown,
}

impl SweepScheduler {
    /// Create a scheduler with the default interval and no device overrides.
    pub fn new(auditor: Arc<ObjectAuditor>, sink: Arc<dyn ReportSink>, shutdown: Shutdown) -> Self {
        Self {
            auditor,
            sink,
            interval: DEFAULT_INTERVAL,
            overrides: Vec::new(),
            shutdown,
        }
    }

    /// Minimum time between the start of consecutive sweeps.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Restrict sweeps to these device names.
    pub fn with_overrides(mut self, overrides: Vec<String>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Run a single sweep without reporting it.
    pub async fn run_once(&self) -> SweepSummary {
        info!("running object audit once");
        self.auditor.run_once(&self.overrides, &self.shutdown).await
    }

    /// Sweep repeatedly until shutdown.
    ///
    /// The first sweep starts after a random delay within one interval so a
    /// fleet of auditors restarted together does not hit drives in lockstep.
    /// Returns the number of completed sweeps.
    pub async fn run_forever(&self) -> u64 {
        info!(interval_secs = self.interval.as_secs_f64(), "object auditor started");
        let fraction: f64 = rand::rng().random_range(0.0..1.0);
        let jitter = Duration::try_from_secs_f64(self.interval.as_secs_f64() * fraction)
            .unwrap_or(self.interval);
        if !self.shutdown.sleep(jitter).await {
            info!("object auditor stopped");
            return 0;
        }

        let mut completed = 0;
        loop {
            let summary = self.auditor.run_once(&self.overrides, &self.shutdown).await;
            if summary.interrupted {
                break;
            }
            completed += 1;

            let elapsed = summary.elapsed;
            info!(elapsed_secs = elapsed.as_secs_f64(), "object audit sweep complete");
            if let Err(e) = self.sink.report(OBJECT_AUDIT_SWEEP, elapsed.as_secs_f64()).await {
                error!(error = %e, "failed to write recon cache");
            }

            let remaining = self.interval.saturating_sub(elapsed);
            if !self.shutdown.sleep(remaining).await {
                break;
            }
        }
        info!(completed, "object auditor stopped");
        completed
    }
}
