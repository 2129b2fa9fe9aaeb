//! Cooperative shutdown signal for the audit loop.

use tokio::sync::watch;
use tokio::time::{Duration, Instant};

/// Observes a shutdown flag sent over a `watch` channel.
///
/// Every sleep in the audit loop goes through [`Shutdown::sleep`] so that a
/// pending shutdown cuts it short.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: Option<watch::Receiver<bool>>,
}

impl Shutdown {
    /// Create a linked sender/observer pair. Send `true` to stop.
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx: Some(rx) })
    }

    /// Observe an existing receiver.
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx: Some(rx) }
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Sleep for `duration` unless shutdown is requested first.
    ///
    /// Returns `true` if the full duration elapsed, `false` if interrupted.
    /// A duration past the end of the clock only ends on shutdown.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_triggered() {
            return false;
        }
        if duration.is_zero() {
            return true;
        }
        let deadline = Instant::now().checked_add(duration);
        let Some(rx) = &self.rx else {
            sleep_until(deadline).await;
            return true;
        };

        let mut rx = rx.clone();
        let signalled = tokio::select! {
            _ = sleep_until(deadline) => return true,
            stopped = rx.wait_for(|stop| *stop) => stopped.is_ok(),
        };
        if signalled {
            return false;
        }
        // Sender gone: nobody can request shutdown any more.
        sleep_until(deadline).await;
        true
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes_without_signal() {
        let (_tx, shutdown) = Shutdown::channel();
        let started = Instant::now();
        assert!(shutdown.sleep(Duration::from_secs(10)).await);
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interrupted_by_signal() {
        let (tx, shutdown) = Shutdown::channel();
        let sleeper = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { shutdown.sleep(Duration::from_secs(3600)).await }
        });
        tokio::time::advance(Duration::from_secs(1)).await;
        tx.send(true).unwrap();
        assert!(!sleeper.await.unwrap());
        assert!(shutdown.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_keeps_sleeping() {
        let (tx, shutdown) = Shutdown::channel();
        drop(tx);
        let started = Instant::now();
        assert!(shutdown.sleep(Duration::from_secs(5)).await);
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_sleep_still_ends_on_signal() {
        let (tx, shutdown) = Shutdown::channel();
        let sleeper = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { shutdown.sleep(Duration::MAX).await }
        });
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!sleeper.is_finished());
        tx.send(true).unwrap();
        assert!(!sleeper.await.unwrap());
    }

    #[tokio::test]
    async fn test_never_is_never_triggered() {
        let shutdown = Shutdown::never();
        assert!(!shutdown.is_triggered());
        assert!(shutdown.sleep(Duration::ZERO).await);
    }
}
