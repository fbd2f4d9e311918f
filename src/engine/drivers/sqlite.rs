// SPDX-License-Identifier: Apache-2.0

//! SQLite Driver
//!
//! Implements the SqlBackend trait for the embedded store using SQLx.
//!
//! ## SQLite Specifics
//!
//! - File-based: the store URL is a filesystem path (or `:memory:`)
//! - Foreign keys are enforced via pragma for consistency
//! - Fixture rows are replaced on every connect so repeated startups are
//!   idempotent

use std::str::FromStr;
use std::time::Instant;

use async_trait::async_trait;
use futures::StreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as SqlxRow, TypeInfo};
use tokio::sync::RwLock;
use tracing::info;

use crate::engine::drivers::{
    returns_rows, ACQUIRE_TIMEOUT, CONN_MAX_LIFETIME, MAX_IDLE_CONNS, MAX_OPEN_CONNS,
};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::traits::SqlBackend;
use crate::engine::types::{ColumnInfo, Dialect, QueryResult, Row, Value};

/// SQLite driver implementation
#[derive(Debug)]
pub struct SqliteDriver {
    slot: RwLock<Option<SqlitePool>>,
}

impl SqliteDriver {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    fn build_connect_options(path: &str) -> EngineResult<SqliteConnectOptions> {
        let conn_str = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}", path)
        };

        let opts = SqliteConnectOptions::from_str(&conn_str)
            .map_err(|e| EngineError::connection_failed(e.to_string()))?
            .create_if_missing(true)
            .busy_timeout(std::time::Duration::from_secs(5))
            // Consistency pragma from the session safety defaults
            .pragma("foreign_keys", "ON");

        Ok(opts)
    }

    /// Creates the schema and replaces the fixture rows. Runs on every
    /// connect; the DELETE keeps repeated startups idempotent.
    async fn seed(pool: &SqlitePool) -> EngineResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS test_data (
                id INTEGER PRIMARY KEY,
                name TEXT,
                value INTEGER
            )",
        )
        .execute(pool)
        .await
        .map_err(|e| EngineError::connection_failed(e.to_string()))?;

        sqlx::query("DELETE FROM test_data")
            .execute(pool)
            .await
            .map_err(|e| EngineError::connection_failed(e.to_string()))?;

        sqlx::query(
            "INSERT INTO test_data (id, name, value) VALUES
                (1, 'Item 1', 100),
                (2, 'Item 2', 200),
                (3, 'Item 3', 300),
                (4, 'Item 4', 400),
                (5, 'Item 5', 500),
                (6, 'Item 6', 600),
                (7, 'Item 7', 700),
                (8, 'Item 8', 800),
                (9, 'Item 9', 900),
                (10, 'Item 10', 1000)",
        )
        .execute(pool)
        .await
        .map_err(|e| EngineError::connection_failed(e.to_string()))?;

        Ok(())
    }

    async fn pool(&self) -> EngineResult<SqlitePool> {
        self.slot
            .read()
            .await
            .clone()
            .ok_or_else(|| EngineError::unavailable(Dialect::Sqlite))
    }

    /// Converts a SQLx row to our universal Row type
    fn convert_row(sqlite_row: &SqliteRow) -> Row {
        let values: Vec<Value> = sqlite_row
            .columns()
            .iter()
            .map(|col| Self::extract_value(sqlite_row, col.ordinal()))
            .collect();

        Row { values }
    }

    /// Extracts a value from a SqliteRow at the given index
    ///
    /// SQLite has dynamic typing, so we try multiple types in order of
    /// likelihood
    fn extract_value(row: &SqliteRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return v.map(Value::Int).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return v.map(Value::Float).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
            return v.map(Value::Bool).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            return v.map(Value::Text).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
            return v.map(Value::Bytes).unwrap_or(Value::Null);
        }

        Value::Null
    }

    fn column_info(row: &SqliteRow) -> Vec<ColumnInfo> {
        row.columns()
            .iter()
            .map(|col| ColumnInfo {
                name: col.name().to_string(),
                data_type: col.type_info().name().to_string(),
            })
            .collect()
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SqlBackend for SqliteDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn is_connected(&self) -> bool {
        self.slot.read().await.is_some()
    }

    async fn connect(&self, url: &str) -> EngineResult<()> {
        let opts = Self::build_connect_options(url)?;

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_OPEN_CONNS)
            .min_connections(MAX_IDLE_CONNS)
            .max_lifetime(CONN_MAX_LIFETIME)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(opts)
            .await
            .map_err(|e| EngineError::connection_failed(e.to_string()))?;

        if let Err(e) = Self::seed(&pool).await {
            pool.close().await;
            return Err(e);
        }

        // Publish, then close the handle being replaced; there is never
        // a moment with two live pools for this dialect.
        let previous = self.slot.write().await.replace(pool);
        if let Some(old) = previous {
            old.close().await;
        }

        info!("sqlite database connected and seeded");
        Ok(())
    }

    async fn ping(&self) -> EngineResult<()> {
        let pool = self.pool().await?;
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| EngineError::connection_failed(e.to_string()))?;
        Ok(())
    }

    async fn execute(&self, sql: &str) -> EngineResult<QueryResult> {
        let pool = self.pool().await?;
        let start = Instant::now();

        if returns_rows(sql) {
            let mut result = QueryResult::empty();
            let mut stream = sqlx::query(sql).fetch(&pool);

            while let Some(item) = stream.next().await {
                let sqlite_row =
                    item.map_err(|e| EngineError::execution_failed(e.to_string()))?;
                if result.columns.is_empty() {
                    result.columns = Self::column_info(&sqlite_row);
                }
                if !result.push_capped(Self::convert_row(&sqlite_row)) {
                    break;
                }
            }

            result.execution_time_ms = start.elapsed().as_secs_f64() * 1000.0;
            Ok(result)
        } else {
            let done = sqlx::query(sql)
                .execute(&pool)
                .await
                .map_err(|e| EngineError::execution_failed(e.to_string()))?;

            Ok(QueryResult::with_affected_rows(
                done.rows_affected(),
                start.elapsed().as_secs_f64() * 1000.0,
            ))
        }
    }
}
