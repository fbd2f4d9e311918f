//! SqlBackend trait definition
//!
//! This is the uniform shape the lifecycle manager uses to drive all
//! three backing stores. Each driver (SQLite, MySQL, PostgreSQL)
//! implements it over its own sqlx pool; the manager never sees a
//! concrete pool type.

use async_trait::async_trait;

use crate::engine::error::EngineResult;
use crate::engine::types::{Dialect, QueryResult};

/// Uniform interface over one dialect's backing store.
///
/// A backend owns at most one published connection pool at a time. All
/// handles returned to callers are the shared `Arc` around the backend
/// itself; replacing the pool never invalidates handed-out references.
#[async_trait]
pub trait SqlBackend: Send + Sync + std::fmt::Debug {
    /// The dialect this backend serves
    fn dialect(&self) -> Dialect;

    /// True while a pool is published, regardless of its health
    async fn is_connected(&self) -> bool;

    /// Establishes (or replaces) the pool for the given store URL.
    ///
    /// On success the backend has applied session safety settings, pool
    /// ceilings, and the one-time seed fixtures, and the new pool is
    /// published. The previous pool, if any, is closed first.
    async fn connect(&self, url: &str) -> EngineResult<()>;

    /// Liveness probe against the published pool
    async fn ping(&self) -> EngineResult<()>;

    /// Executes a statement and extracts at most
    /// [`MAX_RESULT_ROWS`](crate::engine::types::MAX_RESULT_ROWS) rows.
    ///
    /// Callers are expected to hold an `allowed` safety verdict for the
    /// statement; this layer does not re-check.
    async fn execute(&self, sql: &str) -> EngineResult<QueryResult>;
}
