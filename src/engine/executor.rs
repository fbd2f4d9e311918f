//! Execution shim
//!
//! Runs a gatekeeper-approved statement on a manager-provided backend
//! under a wall-clock deadline. The deadline aborts only the in-flight
//! execution; the shared pooled connection stays available to
//! subsequent requests.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::instrument;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::traits::SqlBackend;
use crate::engine::types::{QueryId, QueryResult};

/// Wall-clock budget for one statement. Caps resource consumption from
/// runaway or intentionally slow statements; the dialect policies block
/// the known sleep built-ins as a second line of defense.
pub const EXECUTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Executes `sql` on the backend, bounded by [`EXECUTION_TIMEOUT`].
#[instrument(skip(backend, sql), fields(dialect = %backend.dialect(), query_id = %QueryId::new()))]
pub async fn execute_bounded(backend: &Arc<dyn SqlBackend>, sql: &str) -> EngineResult<QueryResult> {
    match timeout(EXECUTION_TIMEOUT, backend.execute(sql)).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Timeout {
            timeout_ms: EXECUTION_TIMEOUT.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::Dialect;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct SlowBackend {
        delay: Duration,
    }

    #[async_trait]
    impl SqlBackend for SlowBackend {
        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }

        async fn is_connected(&self) -> bool {
            true
        }

        async fn connect(&self, _url: &str) -> EngineResult<()> {
            Ok(())
        }

        async fn ping(&self) -> EngineResult<()> {
            Ok(())
        }

        async fn execute(&self, _sql: &str) -> EngineResult<QueryResult> {
            tokio::time::sleep(self.delay).await;
            Ok(QueryResult::empty())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_produces_typed_timeout() {
        let backend: Arc<dyn SqlBackend> = Arc::new(SlowBackend {
            delay: EXECUTION_TIMEOUT * 2,
        });

        let err = execute_bounded(&backend, "SELECT 1").await.unwrap_err();
        assert!(matches!(err, EngineError::Timeout { timeout_ms: 5000 }));
    }

    #[tokio::test]
    async fn fast_statement_passes_through() {
        let backend: Arc<dyn SqlBackend> = Arc::new(SlowBackend {
            delay: Duration::from_millis(1),
        });

        let result = execute_bounded(&backend, "SELECT 1").await.unwrap();
        assert!(result.rows.is_empty());
    }
}
