//! Connection management: retries, timeouts, and optional pooling.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use scour_types::Device;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::error::StoreError;
use crate::traits::{Connector, KeyValueStore};

/// Tuning for [`ConnectionManager`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Deadline for a single connect attempt.
    pub connect_timeout: Duration,
    /// Deadline for a single drive operation.
    pub response_timeout: Duration,
    /// Connect attempts before the device is declared unavailable.
    pub connect_retry: u32,
    /// Pause between connect attempts.
    pub retry_delay: Duration,
    /// Keep one connection per device across calls.
    pub persist_connection: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            response_timeout: Duration::from_secs(30),
            connect_retry: 3,
            retry_delay: Duration::from_secs(1),
            persist_connection: false,
        }
    }
}

/// Hands out drive connections, retrying failed connects.
///
/// Every connection returned is wrapped so that each operation is bounded by
/// the configured response timeout.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    config: ConnectionConfig,
    pool: Mutex<HashMap<String, Arc<dyn KeyValueStore>>>,
}

impl ConnectionManager {
    /// Create a manager over `connector`.
    pub fn new(connector: Arc<dyn Connector>, config: ConnectionConfig) -> Self {
        Self {
            connector,
            config,
            pool: Mutex::new(HashMap::new()),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Get a connection to `device`, reusing a pooled one when enabled.
    ///
    /// Returns [`StoreError::DeviceUnavailable`] once every attempt failed.
    pub async fn get_connection(&self, device: &Device) -> Result<Arc<dyn KeyValueStore>, StoreError> {
        if !self.config.persist_connection {
            return self.new_connection(device).await;
        }

        let mut pool = self.pool.lock().await;
        if let Some(conn) = pool.get(&device.name) {
            return Ok(conn.clone());
        }
        let conn = self.new_connection(device).await?;
        pool.insert(device.name.clone(), conn.clone());
        Ok(conn)
    }

    /// Drop any pooled connection to `device` so the next call reconnects.
    pub async fn mark_faulted(&self, device: &str) {
        if self.pool.lock().await.remove(device).is_some() {
            debug!(device, "dropped faulted pooled connection");
        }
    }

    async fn new_connection(&self, device: &Device) -> Result<Arc<dyn KeyValueStore>, StoreError> {
        let attempts = self.config.connect_retry.max(1);
        for attempt in 1..=attempts {
            match tokio::time::timeout(self.config.connect_timeout, self.connector.connect(device)).await {
                Ok(Ok(inner)) => {
                    debug!(%device, attempt, "connected to drive");
                    return Ok(Arc::new(TimeoutStore {
                        inner,
                        timeout: self.config.response_timeout,
                    }));
                }
                Ok(Err(e)) => {
                    warn!(%device, attempt, error = %e, "drive connection error");
                }
                Err(_) => {
                    warn!(
                        %device,
                        attempt,
                        timeout_secs = self.config.connect_timeout.as_secs_f64(),
                        "drive connect timeout"
                    );
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        error!(%device, attempts, "unable to connect to drive");
        Err(StoreError::DeviceUnavailable {
            device: device.name.clone(),
            attempts,
        })
    }
}

/// Bounds every operation of the wrapped connection by a deadline.
struct TimeoutStore {
    inner: Arc<dyn KeyValueStore>,
    timeout: Duration,
}

impl TimeoutStore {
    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout {
                op,
                after: self.timeout,
            })?
    }
}

#[async_trait::async_trait]
impl KeyValueStore for TimeoutStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.bounded("get", self.inner.get(key)).await
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        self.bounded("put", self.inner.put(key, value)).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.bounded("delete", self.inner.delete(key)).await
    }

    async fn rename(&self, from: &str, to: &str) -> Result<bool, StoreError> {
        self.bounded("rename", self.inner.rename(from, to)).await
    }

    async fn get_key_range(
        &self,
        start: &str,
        end: &str,
        start_inclusive: bool,
        max_keys: usize,
    ) -> Result<Vec<String>, StoreError> {
        self.bounded(
            "get_key_range",
            self.inner.get_key_range(start, end, start_inclusive, max_keys),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryConnector;

    fn config(persist: bool) -> ConnectionConfig {
        ConnectionConfig {
            persist_connection: persist,
            ..ConnectionConfig::default()
        }
    }

    /// Connector that never answers.
    struct HangingConnector;

    #[async_trait::async_trait]
    impl Connector for HangingConnector {
        async fn connect(&self, _device: &Device) -> Result<Arc<dyn KeyValueStore>, StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_device_unavailable() {
        let connector = Arc::new(MemoryConnector::new());
        let manager = ConnectionManager::new(connector.clone(), config(false));
        let device = Device::parse("127.0.0.1:9").unwrap();

        let err = manager.get_connection(&device).await.err().unwrap();
        assert!(err.is_device_unavailable());
        assert!(matches!(err, StoreError::DeviceUnavailable { attempts: 3, .. }));
        assert_eq!(connector.connect_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout_counts_as_failed_attempt() {
        let manager = ConnectionManager::new(Arc::new(HangingConnector), config(false));
        let device = Device::parse("127.0.0.1:9").unwrap();

        let started = tokio::time::Instant::now();
        let err = manager.get_connection(&device).await.err().unwrap();
        assert!(err.is_device_unavailable());
        // 3 timeouts of 3s plus 2 pauses of 1s.
        assert!(started.elapsed() >= Duration::from_secs(11));
    }

    #[tokio::test]
    async fn test_pooling_reuses_connection() {
        let connector = Arc::new(MemoryConnector::new());
        connector.add_drive("127.0.0.1:1");
        let manager = ConnectionManager::new(connector.clone(), config(true));
        let device = Device::parse("127.0.0.1:1").unwrap();

        manager.get_connection(&device).await.unwrap();
        manager.get_connection(&device).await.unwrap();
        assert_eq!(connector.connect_count(), 1);

        manager.mark_faulted("127.0.0.1:1").await;
        manager.get_connection(&device).await.unwrap();
        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_without_pooling_connects_every_time() {
        let connector = Arc::new(MemoryConnector::new());
        connector.add_drive("127.0.0.1:1");
        let manager = ConnectionManager::new(connector.clone(), config(false));
        let device = Device::parse("127.0.0.1:1").unwrap();

        manager.get_connection(&device).await.unwrap();
        manager.get_connection(&device).await.unwrap();
        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_connection_passes_operations_through() {
        let connector = Arc::new(MemoryConnector::new());
        let drive = connector.add_drive("127.0.0.1:1");
        let manager = ConnectionManager::new(connector, config(false));
        let conn = manager
            .get_connection(&Device::parse("127.0.0.1:1").unwrap())
            .await
            .unwrap();

        conn.put("objects.a", Bytes::from_static(b"x")).await.unwrap();
        assert_eq!(drive.len(), 1);
    }
}
