//! Virtual-clock rate limiter for audit I/O.
//!
//! [`RateBudget`] keeps audit traffic under a per-second ceiling so scanning
//! does not starve client I/O. Every unit consumed (a byte, a file) advances a
//! virtual clock by `1 / rate` seconds; when the virtual clock runs ahead of
//! the real one, the caller sleeps off the difference.

use rand::Rng;
use tokio::time::{Duration, Instant};
use tracing::trace;

/// How far the virtual clock may lag behind real time before it is pulled
/// forward. Bounds the burst allowed after an idle stretch.
pub const RATE_BUFFER: Duration = Duration::from_secs(5);

/// Upper bound of the random jitter added to every non-zero wait.
pub const MAX_JITTER: Duration = Duration::from_millis(1);

/// Accumulated virtual time for one rate-limited quantity.
///
/// One budget lives for one sweep and is reset by replacing it.
#[derive(Debug, Default)]
pub struct RateBudget {
    /// Virtual time consumed so far. `None` until the first reservation.
    running: Option<Instant>,
    /// Total wait handed out, jitter included.
    waited: Duration,
}

impl RateBudget {
    /// Create an empty budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for `amount` units at `max_rate` units/second and return how
    /// long the caller must wait before proceeding.
    ///
    /// A non-positive or non-finite `max_rate` disables limiting. A rate so
    /// small that the cost runs off the clock returns [`Duration::MAX`].
    pub fn reserve(&mut self, max_rate: f64, amount: u64) -> Duration {
        if !max_rate.is_finite() || max_rate <= 0.0 || amount == 0 {
            return Duration::ZERO;
        }

        let now = Instant::now();
        let mut running = self.running.unwrap_or(now);
        if now.saturating_duration_since(running) > RATE_BUFFER {
            running = now;
        }
        let cost = Duration::try_from_secs_f64(amount as f64 / max_rate).unwrap_or(Duration::MAX);
        let Some(next) = running.checked_add(cost) else {
            self.running = Some(running);
            self.waited = Duration::MAX;
            return Duration::MAX;
        };
        self.running = Some(next);

        let ahead = next.saturating_duration_since(now);
        if ahead.is_zero() {
            return Duration::ZERO;
        }
        let jitter = rand::rng().random_range(Duration::ZERO..MAX_JITTER);
        let wait = ahead.saturating_add(jitter);
        self.waited = self.waited.saturating_add(wait);
        trace!(wait_us = wait.as_micros() as u64, amount, max_rate, "rate limit wait");
        wait
    }

    /// Reserve and sleep off the wait in one go.
    pub async fn throttle(&mut self, max_rate: f64, amount: u64) {
        let wait = self.reserve(max_rate, amount);
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    /// Total wait handed out by this budget.
    pub fn waited(&self) -> Duration {
        self.waited
    }
}
