//! Connection registry.
//!
//! Holds at most one live connection per configuration name. A connection is
//! created lazily on first use, probed before every reuse, and replaced when
//! the probe fails or when its last statement was abandoned mid-flight.
//!
//! Each configuration name owns one slot guarded by an async mutex. The
//! check-then-create sequence runs under that lock, so two concurrent first
//! uses of a name cannot both create a connection, and an operation keeps the
//! lock (through its [`ConnectionLease`]) until it finishes.

use std::collections::HashMap;
use std::sync::Arc;

use common::errors::{AppError, AppResult};
use tokio::sync::{Mutex, OwnedMappedMutexGuard, OwnedMutexGuard, RwLock};
use tokio::time::timeout;

use crate::adapter::{self, LiveConnection, Timeouts};
use crate::config_store::ConfigStore;

type Slot = Arc<Mutex<Option<LiveConnection>>>;

/// Exclusive access to the live connection of one configuration name.
///
/// The slot stays locked while the lease is alive; drop it to let the next
/// caller in.
pub type ConnectionLease = OwnedMappedMutexGuard<Option<LiveConnection>, LiveConnection>;

/// Registry of live connections keyed by configuration name.
pub struct ConnectionRegistry {
    store: Arc<ConfigStore>,
    timeouts: Timeouts,
    /// Slots are created on first use and never removed; an empty slot means
    /// "no connection". Removing slots would let a caller still holding the
    /// old slot create a second connection for the same name.
    slots: RwLock<HashMap<String, Slot>>,
}

impl ConnectionRegistry {
    pub fn new(store: Arc<ConfigStore>, timeouts: Timeouts) -> Self {
        Self {
            store,
            timeouts,
            slots: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// Returns a valid connection for `name`, creating or replacing it as needed.
    ///
    /// Fails with `ConfigNameUnknown` for names absent from the store. When
    /// creation fails the slot is left empty.
    pub async fn acquire(&self, name: &str) -> AppResult<ConnectionLease> {
        // Unknown names never get a slot.
        self.store.get(name)?;

        let slot = self.slot(name).await;
        let mut guard = slot.lock_owned().await;

        let reusable = match guard.as_mut() {
            Some(conn) => self.validate(conn).await,
            None => false,
        };
        if reusable {
            return Self::lease(name, guard);
        }

        if let Some(stale) = guard.take() {
            tracing::warn!(config = %name, id = stale.id(), "Connection invalid, recreating");
            self.close_quietly(stale).await;
        }

        let settings = self.store.resolve(name)?;
        let conn = adapter::connect(&settings, &self.timeouts)
            .await
            .inspect_err(|e| tracing::error!(config = %name, error = %e, "Failed to connect"))?;
        *guard = Some(conn);
        Self::lease(name, guard)
    }

    /// Closes and forgets the connection for `name`. Returns whether one existed.
    pub async fn release(&self, name: &str) -> bool {
        let Some(slot) = self.slots.read().await.get(name).cloned() else {
            return false;
        };
        let conn = slot.lock().await.take();
        match conn {
            Some(conn) => {
                tracing::info!(config = %name, id = conn.id(), "Releasing connection");
                self.close_quietly(conn).await;
                true
            }
            None => false,
        }
    }

    /// Closes every live connection. Close failures are logged, never raised.
    pub async fn release_all(&self) -> usize {
        let names: Vec<String> = self.slots.read().await.keys().cloned().collect();
        let mut released = 0;
        for name in names {
            if self.release(&name).await {
                released += 1;
            }
        }
        tracing::info!(released, "All connections released");
        released
    }

    /// Whether a connection is currently held for `name`. Waits for any
    /// in-progress operation on that name.
    pub async fn is_connected(&self, name: &str) -> bool {
        let Some(slot) = self.slots.read().await.get(name).cloned() else {
            return false;
        };
        let connected = slot.lock().await.is_some();
        connected
    }

    /// Number of occupied slots, without waiting. A slot locked by a running
    /// operation counts as occupied.
    pub async fn active_connections(&self) -> usize {
        self.slots
            .read()
            .await
            .values()
            .filter(|slot| match slot.try_lock() {
                Ok(guard) => guard.is_some(),
                Err(_) => true,
            })
            .count()
    }

    async fn slot(&self, name: &str) -> Slot {
        if let Some(slot) = self.slots.read().await.get(name) {
            return slot.clone();
        }
        self.slots
            .write()
            .await
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    async fn validate(&self, conn: &mut LiveConnection) -> bool {
        if conn.is_in_flight() {
            tracing::debug!(config = %conn.config_name(), id = conn.id(), "Previous statement abandoned");
            return false;
        }
        match timeout(self.timeouts.probe, conn.ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::debug!(config = %conn.config_name(), error = %e, "Liveness probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(config = %conn.config_name(), "Liveness probe timed out");
                false
            }
        }
    }

    async fn close_quietly(&self, conn: LiveConnection) {
        let name = conn.config_name().to_string();
        match timeout(self.timeouts.probe, conn.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(config = %name, error = %e, "Error closing connection"),
            Err(_) => tracing::warn!(config = %name, "Timed out closing connection"),
        }
    }

    fn lease(name: &str, guard: OwnedMutexGuard<Option<LiveConnection>>) -> AppResult<ConnectionLease> {
        OwnedMutexGuard::try_map(guard, Option::as_mut).map_err(|_| {
            AppError::Internal(format!("connection slot for '{}' is empty", name))
        })
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use std::time::Duration;

    use common::utils::QueryGate;

    use super::*;
    #[cfg(feature = "mysql")]
    use crate::test_support::mysql_store;
    use crate::test_support::sqlite_fixture;

    #[tokio::test]
    async fn test_acquire_reuses_connection() {
        let fixture = sqlite_fixture().await;
        let registry = ConnectionRegistry::new(fixture.store.clone(), Timeouts::default());

        let first = registry.acquire("default").await.unwrap().id();
        let second = registry.acquire("default").await.unwrap().id();
        assert_eq!(first, second);
        assert!(registry.is_connected("default").await);
        assert_eq!(registry.active_connections().await, 1);
    }

    #[tokio::test]
    async fn test_release_then_acquire_creates_new_connection() {
        let fixture = sqlite_fixture().await;
        let registry = ConnectionRegistry::new(fixture.store.clone(), Timeouts::default());

        let first = registry.acquire("default").await.unwrap().id();
        assert!(registry.release("default").await);
        assert!(!registry.is_connected("default").await);
        assert!(!registry.release("default").await);

        let second = registry.acquire("default").await.unwrap().id();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_unknown_name_is_rejected_without_slot() {
        let fixture = sqlite_fixture().await;
        let registry = ConnectionRegistry::new(fixture.store.clone(), Timeouts::default());

        let err = registry.acquire("missing").await.unwrap_err();
        assert!(matches!(err, AppError::ConfigNameUnknown(name) if name == "missing"));
        assert_eq!(registry.active_connections().await, 0);
        assert!(!registry.release("missing").await);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_creates_one_connection() {
        let fixture = sqlite_fixture().await;
        let registry = Arc::new(ConnectionRegistry::new(fixture.store.clone(), Timeouts::default()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.acquire("default").await.map(|lease| lease.id()) })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_statement_forces_new_connection() {
        let fixture = sqlite_fixture().await;
        let timeouts = Timeouts {
            query: Duration::from_millis(1),
            ..Timeouts::default()
        };
        let registry = ConnectionRegistry::new(fixture.store.clone(), timeouts);

        let slow = "SELECT COUNT(*) FROM users a, users b, users c, users d, users e, users f, \
                    users g, users h, users i, users j, users k, users l, users m, users n, users o";
        let statement = QueryGate::evaluate(slow, 10).into_result().unwrap();

        let first = {
            let mut lease = registry.acquire("default").await.unwrap();
            let err = lease.execute(&statement).await.unwrap_err();
            match err {
                AppError::BackendExecutionFailed { message, .. } => {
                    assert_eq!(message, "execute timed out after 1ms")
                }
                other => panic!("unexpected error: {other}"),
            }
            assert!(lease.is_in_flight());
            lease.id()
        };

        let second = registry.acquire("default").await.unwrap().id();
        assert_ne!(first, second);
        assert_eq!(registry.active_connections().await, 1);

        // A healthy connection is kept across further cycles.
        let third = registry.acquire("default").await.unwrap().id();
        assert_eq!(second, third);
        assert_eq!(registry.active_connections().await, 1);
    }

    #[tokio::test]
    async fn test_release_all_closes_everything() {
        let fixture = sqlite_fixture().await;
        let registry = ConnectionRegistry::new(fixture.store.clone(), Timeouts::default());

        drop(registry.acquire("default").await.unwrap());
        drop(registry.acquire("archive").await.unwrap());
        assert_eq!(registry.active_connections().await, 2);

        assert_eq!(registry.release_all().await, 2);
        assert_eq!(registry.active_connections().await, 0);
        assert_eq!(registry.release_all().await, 0);
    }

    #[cfg(feature = "mysql")]
    #[tokio::test]
    async fn test_unreachable_server_leaves_no_entry() {
        let store = mysql_store("127.0.0.1", 1);
        let registry = ConnectionRegistry::new(store, Timeouts::default());

        let err = registry.acquire("default").await.unwrap_err();
        assert!(matches!(err, AppError::ConnectionFailed { ref config, .. } if config == "default"));
        assert!(!registry.is_connected("default").await);
        assert_eq!(registry.active_connections().await, 0);
    }
}
