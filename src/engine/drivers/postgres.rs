// SPDX-License-Identifier: Apache-2.0

//! PostgreSQL Driver
//!
//! Implements the SqlBackend trait for PostgreSQL using SQLx.
//!
//! The statement timeout is session-scoped and applied to every pooled
//! connection through `after_connect`; `lo_compat_privileges` requires
//! superuser and is issued once, best-effort.

use std::time::Instant;

use async_trait::async_trait;
use futures::StreamExt;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Executor, Row as SqlxRow, TypeInfo};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::engine::drivers::{
    returns_rows, ACQUIRE_TIMEOUT, CONN_MAX_LIFETIME, MAX_IDLE_CONNS, MAX_OPEN_CONNS,
};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::traits::SqlBackend;
use crate::engine::types::{ColumnInfo, Dialect, QueryResult, Row, Value};

/// PostgreSQL driver implementation
#[derive(Debug)]
pub struct PostgresDriver {
    slot: RwLock<Option<PgPool>>,
}

impl PostgresDriver {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    async fn pool(&self) -> EngineResult<PgPool> {
        self.slot
            .read()
            .await
            .clone()
            .ok_or_else(|| EngineError::unavailable(Dialect::Postgresql))
    }

    /// One-time schema/seed initialization, skipped when rows exist.
    async fn seed(pool: &PgPool) -> EngineResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS customers (
                id SERIAL PRIMARY KEY,
                first_name VARCHAR(50) NOT NULL,
                last_name VARCHAR(50) NOT NULL,
                email VARCHAR(100) UNIQUE NOT NULL,
                phone VARCHAR(20),
                country VARCHAR(50),
                city VARCHAR(50),
                address TEXT,
                postal_code VARCHAR(20),
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(pool)
        .await
        .map_err(|e| EngineError::connection_failed(e.to_string()))?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

        if count == 0 {
            sqlx::query(
                "INSERT INTO customers (first_name, last_name, email, phone, country, city, address, postal_code) VALUES
                    ('John', 'Doe', 'john.doe@example.com', '555-123-4567', 'USA', 'New York', '123 Broadway St', '10001'),
                    ('Jane', 'Smith', 'jane.smith@example.com', '555-987-6543', 'USA', 'Los Angeles', '456 Hollywood Blvd', '90028'),
                    ('Robert', 'Johnson', 'robert.j@example.com', '555-234-5678', 'USA', 'Chicago', '789 Michigan Ave', '60601'),
                    ('Emily', 'Williams', 'emily.w@example.com', '555-345-6789', 'Canada', 'Toronto', '567 Yonge St', 'M4Y 1Z2'),
                    ('Michael', 'Brown', 'michael.b@example.com', '555-456-7890', 'UK', 'London', '234 Oxford St', 'W1D 1BS'),
                    ('Sarah', 'Davis', 'sarah.d@example.com', '555-567-8901', 'Australia', 'Sydney', '890 George St', '2000'),
                    ('David', 'Miller', 'david.m@example.com', '555-678-9012', 'Germany', 'Berlin', '123 Unter den Linden', '10117'),
                    ('Jennifer', 'Wilson', 'jennifer.w@example.com', '555-789-0123', 'France', 'Paris', '456 Champs-Élysées', '75008'),
                    ('James', 'Taylor', 'james.t@example.com', '555-890-1234', 'Japan', 'Tokyo', '789 Shibuya', '150-0002'),
                    ('Lisa', 'Anderson', 'lisa.a@example.com', '555-901-2345', 'Italy', 'Rome', '890 Via del Corso', '00186'),
                    ('Thomas', 'Jackson', 'thomas.j@example.com', '555-012-3456', 'Spain', 'Madrid', '123 Gran Via', '28013'),
                    ('Patricia', 'White', 'patricia.w@example.com', '555-123-4567', 'Brazil', 'Rio de Janeiro', '456 Copacabana', '22070'),
                    ('Richard', 'Harris', 'richard.h@example.com', '555-234-5678', 'USA', 'San Francisco', '789 Market St', '94103'),
                    ('Elizabeth', 'Clark', 'elizabeth.c@example.com', '555-345-6789', 'USA', 'Boston', '890 Newbury St', '02115')",
            )
            .execute(pool)
            .await
            .map_err(|e| EngineError::connection_failed(e.to_string()))?;
        }

        Ok(())
    }

    /// Converts a SQLx row to our universal Row type
    fn convert_row(pg_row: &PgRow) -> Row {
        let values: Vec<Value> = pg_row
            .columns()
            .iter()
            .map(|col| Self::extract_value(pg_row, col.ordinal()))
            .collect();

        Row { values }
    }

    /// Extracts a value from a PgRow at the given index
    fn extract_value(row: &PgRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return v.map(Value::Int).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return v.map(|i| Value::Int(i as i64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            return v.map(|i| Value::Int(i as i64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
            return v.map(Value::Bool).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return v.map(Value::Float).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
            return v.map(|f| Value::Float(f as f64)).unwrap_or(Value::Null);
        }
        // NUMERIC columns
        if let Ok(v) = row.try_get::<Option<rust_decimal::Decimal>, _>(idx) {
            return v.map(|d| Value::Text(d.to_string())).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            return v.map(Value::Text).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
            return v.map(|dt| Value::Text(dt.to_rfc3339())).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
            return v
                .map(|dt| Value::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()))
                .unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
            return v
                .map(|d| Value::Text(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
            return v.map(Value::Bytes).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<serde_json::Value>, _>(idx) {
            return v.map(Value::Json).unwrap_or(Value::Null);
        }

        Value::Null
    }

    fn column_info(row: &PgRow) -> Vec<ColumnInfo> {
        row.columns()
            .iter()
            .map(|col| ColumnInfo {
                name: col.name().to_string(),
                data_type: col.type_info().name().to_string(),
            })
            .collect()
    }
}

impl Default for PostgresDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SqlBackend for PostgresDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Postgresql
    }

    async fn is_connected(&self) -> bool {
        self.slot.read().await.is_some()
    }

    async fn connect(&self, url: &str) -> EngineResult<()> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_OPEN_CONNS)
            .min_connections(MAX_IDLE_CONNS)
            .max_lifetime(CONN_MAX_LIFETIME)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    conn.execute("SET statement_timeout = 5000").await?;
                    Ok(())
                })
            })
            .connect(url)
            .await
            .map_err(|e| EngineError::connection_failed(e.to_string()))?;

        // Filesystem access via large objects; needs superuser, so
        // best-effort like the rest of the global settings.
        if let Err(e) = sqlx::query("SET lo_compat_privileges = off").execute(&pool).await {
            warn!("failed to apply postgres safety setting: {}", e);
        }

        if let Err(e) = Self::seed(&pool).await {
            pool.close().await;
            return Err(e);
        }

        let previous = self.slot.write().await.replace(pool);
        if let Some(old) = previous {
            old.close().await;
        }

        info!("postgresql database connected and initialized");
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
                let pg_row = item.map_err(|e| EngineError::execution_failed(e.to_string()))?;
                if result.columns.is_empty() {
                    result.columns = Self::column_info(&pg_row);
                }
                if !result.push_capped(Self::convert_row(&pg_row)) {
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
