//! Connection Lifecycle Manager
//!
//! Centralized management of the per-dialect store connections.
//! This is the SINGLE SOURCE OF TRUTH for connection state: one slot per
//! dialect, each with its own reachability flag and its own reconnect
//! critical section, so one dialect's reconnect never blocks another's
//! acquisition.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::traits::SqlBackend;
use crate::engine::types::Dialect;

/// Bounded retry schedule for the background connect loops.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(5),
        }
    }
}

/// Per-dialect connection state.
///
/// The reconnect mutex serializes handle replacement for this dialect
/// only; concurrent callers for other dialects are unaffected.
struct DialectSlot {
    backend: Arc<dyn SqlBackend>,
    url: String,
    reachable: AtomicBool,
    reconnect: Mutex<()>,
}

/// Manages connection lifecycle for all configured dialects
pub struct ConnectionManager {
    slots: HashMap<Dialect, Arc<DialectSlot>>,
    retry: RetryPolicy,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::with_retry(RetryPolicy::default())
    }

    pub fn with_retry(retry: RetryPolicy) -> Self {
        Self {
            slots: HashMap::new(),
            retry,
        }
    }

    /// Registers a backend together with the store URL it connects to.
    /// The backend's `dialect()` is used as the key.
    pub fn register(&mut self, backend: Arc<dyn SqlBackend>, url: impl Into<String>) {
        let dialect = backend.dialect();
        self.slots.insert(
            dialect,
            Arc::new(DialectSlot {
                backend,
                url: url.into(),
                reachable: AtomicBool::new(false),
                reconnect: Mutex::new(()),
            }),
        );
    }

    /// Establishes the initial connections.
    ///
    /// Embedded stores connect synchronously; their failure is returned
    /// to the caller (best-effort, not fatal to the process). Each
    /// network store gets one independent background retry task that
    /// exits once the budget is exhausted.
    pub async fn init(&self) -> EngineResult<()> {
        let mut embedded_err = None;

        for slot in self.slots.values() {
            if slot.backend.dialect().requires_network() {
                let slot = Arc::clone(slot);
                let retry = self.retry;
                tokio::spawn(async move {
                    Self::connect_with_retry(slot, retry).await;
                });
            } else if let Err(e) = Self::try_connect(slot).await {
                warn!("{} initialization error: {}", slot.backend.dialect(), e);
                embedded_err = Some(e);
            }
        }

        match embedded_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn try_connect(slot: &DialectSlot) -> EngineResult<()> {
        slot.backend.connect(&slot.url).await?;
        slot.reachable.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn connect_with_retry(slot: Arc<DialectSlot>, retry: RetryPolicy) {
        let dialect = slot.backend.dialect();

        for attempt in 1..=retry.max_attempts {
            info!(
                "attempting to connect to {} (attempt {}/{})",
                dialect, attempt, retry.max_attempts
            );

            // Same critical section as on-demand reconnects, so the
            // loop and an acquisition never publish competing handles.
            let result = {
                let _guard = slot.reconnect.lock().await;
                Self::try_connect(&slot).await
            };

            match result {
                Ok(()) => return,
                Err(e) => warn!("failed to connect to {}: {}", dialect, e),
            }

            if attempt < retry.max_attempts {
                tokio::time::sleep(retry.delay).await;
            }
        }

        // Status stays unreachable; on-demand acquisition can still heal
        // the dialect later.
        warn!("retry budget exhausted for {}", dialect);
    }

    /// Returns the live handle for a dialect.
    ///
    /// A failing liveness probe marks the dialect unreachable and
    /// triggers at most one reconnect attempt under the slot's mutex;
    /// callers that queued behind the winner converge on its handle via
    /// a fresh probe instead of reconnecting again.
    #[instrument(skip(self))]
    pub async fn get_connection(&self, dialect: Dialect) -> EngineResult<Arc<dyn SqlBackend>> {
        let slot = self
            .slots
            .get(&dialect)
            .ok_or_else(|| EngineError::unavailable(dialect))?;

        if slot.backend.ping().await.is_ok() {
            slot.reachable.store(true, Ordering::SeqCst);
            return Ok(Arc::clone(&slot.backend));
        }

        slot.reachable.store(false, Ordering::SeqCst);
        let _guard = slot.reconnect.lock().await;

        // A concurrent caller may have republished the pool while we
        // waited for the lock.
        if slot.backend.ping().await.is_ok() {
            slot.reachable.store(true, Ordering::SeqCst);
            return Ok(Arc::clone(&slot.backend));
        }

        match Self::try_connect(slot).await {
            Ok(()) => Ok(Arc::clone(&slot.backend)),
            Err(e) => {
                warn!("reconnect failed for {}: {}", dialect, e);
                Err(EngineError::unavailable(dialect))
            }
        }
    }

    /// Re-probes every dialect that has a published handle and returns
    /// the refreshed reachability mapping. Dialects that never connected
    /// report their stored flag.
    pub async fn statuses(&self) -> BTreeMap<Dialect, bool> {
        let mut statuses = BTreeMap::new();

        for (dialect, slot) in &self.slots {
            if slot.backend.is_connected().await {
                let alive = slot.backend.ping().await.is_ok();
                slot.reachable.store(alive, Ordering::SeqCst);
            }
            statuses.insert(*dialect, slot.reachable.load(Ordering::SeqCst));
        }

        statuses
    }

    /// Dialects with a registered slot
    pub fn dialects(&self) -> Vec<Dialect> {
        let mut dialects: Vec<Dialect> = self.slots.keys().copied().collect();
        dialects.sort();
        dialects
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::QueryResult;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    /// Scriptable in-memory backend: the first `fail_connects` connect
    /// calls fail, later ones publish a "pool"; ping succeeds only while
    /// published and healthy.
    #[derive(Debug)]
    struct MockBackend {
        dialect: Dialect,
        connect_calls: AtomicU32,
        fail_connects: u32,
        published: AtomicBool,
        healthy: AtomicBool,
    }

    impl MockBackend {
        fn new(dialect: Dialect, fail_connects: u32) -> Self {
            Self {
                dialect,
                connect_calls: AtomicU32::new(0),
                fail_connects,
                published: AtomicBool::new(false),
                healthy: AtomicBool::new(true),
            }
        }

        fn connects(&self) -> u32 {
            self.connect_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SqlBackend for MockBackend {
        fn dialect(&self) -> Dialect {
            self.dialect
        }

        async fn is_connected(&self) -> bool {
            self.published.load(Ordering::SeqCst)
        }

        async fn connect(&self, _url: &str) -> EngineResult<()> {
            let n = self.connect_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_connects {
                return Err(EngineError::connection_failed("refused"));
            }
            self.published.store(true, Ordering::SeqCst);
            self.healthy.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn ping(&self) -> EngineResult<()> {
            if self.published.load(Ordering::SeqCst) && self.healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(EngineError::unavailable(self.dialect))
            }
        }

        async fn execute(&self, _sql: &str) -> EngineResult<QueryResult> {
            Ok(QueryResult::empty())
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            delay: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn embedded_init_failure_is_surfaced() {
        let backend = Arc::new(MockBackend::new(Dialect::Sqlite, u32::MAX));
        let mut manager = ConnectionManager::with_retry(fast_retry());
        manager.register(Arc::clone(&backend) as Arc<dyn SqlBackend>, ":memory:");

        assert!(manager.init().await.is_err());
        assert_eq!(manager.statuses().await.get(&Dialect::Sqlite), Some(&false));
    }

    #[tokio::test]
    async fn retry_budget_exhaustion_reports_unreachable() {
        let backend = Arc::new(MockBackend::new(Dialect::Mysql, u32::MAX));
        let mut manager = ConnectionManager::with_retry(fast_retry());
        manager.register(Arc::clone(&backend) as Arc<dyn SqlBackend>, "mysql://x");

        manager.init().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Background loop stopped after its budget
        assert_eq!(backend.connects(), 2);
        assert_eq!(manager.statuses().await.get(&Dialect::Mysql), Some(&false));

        // Acquisition performs exactly one extra attempt, then fails typed
        let err = manager.get_connection(Dialect::Mysql).await.unwrap_err();
        assert!(matches!(err, EngineError::ConnectionUnavailable { .. }));
        assert_eq!(backend.connects(), 3);
    }

    #[tokio::test]
    async fn healthy_backend_is_returned_without_reconnect() {
        let backend = Arc::new(MockBackend::new(Dialect::Sqlite, 0));
        let mut manager = ConnectionManager::with_retry(fast_retry());
        manager.register(Arc::clone(&backend) as Arc<dyn SqlBackend>, ":memory:");
        manager.init().await.unwrap();

        let connects_after_init = backend.connects();
        let handle = manager.get_connection(Dialect::Sqlite).await.unwrap();
        assert_eq!(handle.dialect(), Dialect::Sqlite);
        assert_eq!(backend.connects(), connects_after_init);
        assert_eq!(manager.statuses().await.get(&Dialect::Sqlite), Some(&true));
    }

    #[tokio::test]
    async fn unregistered_dialect_is_unavailable() {
        let manager = ConnectionManager::new();
        let err = manager.get_connection(Dialect::Postgresql).await.unwrap_err();
        assert!(matches!(err, EngineError::ConnectionUnavailable { .. }));
    }

    #[tokio::test]
    async fn concurrent_acquisition_reconnects_once() {
        let backend = Arc::new(MockBackend::new(Dialect::Postgresql, 0));
        let mut manager = ConnectionManager::with_retry(fast_retry());
        manager.register(Arc::clone(&backend) as Arc<dyn SqlBackend>, "postgres://x");
        let manager = Arc::new(manager);

        // Transient outage: nothing published yet, every probe fails
        assert_eq!(backend.connects(), 0);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let manager = Arc::clone(&manager);
            tasks.push(tokio::spawn(async move {
                manager.get_connection(Dialect::Postgresql).await
            }));
        }

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap().unwrap());
        }

        // One caller won the reconnect; everyone observes the same handle
        assert_eq!(backend.connects(), 1);
        for handle in &handles {
            assert!(Arc::ptr_eq(handle, &handles[0]));
        }
    }

    #[tokio::test]
    async fn statuses_reflect_a_later_outage() {
        let backend = Arc::new(MockBackend::new(Dialect::Mysql, 0));
        let mut manager = ConnectionManager::with_retry(fast_retry());
        manager.register(Arc::clone(&backend) as Arc<dyn SqlBackend>, "mysql://x");
        manager.init().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(manager.statuses().await.get(&Dialect::Mysql), Some(&true));

        backend.healthy.store(false, Ordering::SeqCst);
        assert_eq!(manager.statuses().await.get(&Dialect::Mysql), Some(&false));
    }
}
