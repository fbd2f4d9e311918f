//! MySQL Driver
//!
//! Implements the SqlBackend trait for MySQL/MariaDB using SQLx.
//!
//! Session safety runs in two layers: `innodb_lock_wait_timeout` is
//! applied per pooled connection through `after_connect`, while the
//! GLOBAL settings (`local_infile`, `max_user_connections`) are issued
//! once, best-effort, since they require SUPER on some deployments.

use std::time::Instant;

use async_trait::async_trait;
use futures::StreamExt;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Executor, Row as SqlxRow, TypeInfo};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::engine::drivers::{
    returns_rows, ACQUIRE_TIMEOUT, CONN_MAX_LIFETIME, MAX_IDLE_CONNS, MAX_OPEN_CONNS,
};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::traits::SqlBackend;
use crate::engine::types::{ColumnInfo, Dialect, QueryResult, Row, Value};

/// GLOBAL settings applied once after the pool comes up. Failures are
/// logged, not fatal: the playground account may lack SUPER.
const GLOBAL_SAFETY_SETTINGS: &[&str] = &[
    "SET GLOBAL local_infile = 0",
    "SET GLOBAL max_user_connections = 3",
];

/// MySQL driver implementation
#[derive(Debug)]
pub struct MySqlDriver {
    slot: RwLock<Option<MySqlPool>>,
}

impl MySqlDriver {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    async fn pool(&self) -> EngineResult<MySqlPool> {
        self.slot
            .read()
            .await
            .clone()
            .ok_or_else(|| EngineError::unavailable(Dialect::Mysql))
    }

    /// One-time schema/seed initialization. Rows are only inserted when
    /// the table is empty, so reconnects never duplicate fixtures.
    async fn seed(pool: &MySqlPool) -> EngineResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS products (
                id INT AUTO_INCREMENT PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                description TEXT,
                price DECIMAL(10,2) NOT NULL,
                category VARCHAR(50),
                stock INT DEFAULT 0,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(pool)
        .await
        .map_err(|e| EngineError::connection_failed(e.to_string()))?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

        if count == 0 {
            sqlx::query(
                "INSERT INTO products (name, description, price, category, stock) VALUES
                    ('Laptop', 'High-performance laptop with SSD', 899.99, 'Electronics', 45),
                    ('Smartphone', 'Latest model with dual camera', 699.99, 'Electronics', 120),
                    ('Coffee Maker', 'Premium coffee machine', 89.99, 'Kitchen', 30),
                    ('Headphones', 'Noise cancelling wireless headphones', 199.99, 'Audio', 75),
                    ('Monitor', '27-inch 4K monitor', 349.99, 'Computer Accessories', 25),
                    ('Office Chair', 'Ergonomic office chair', 249.99, 'Furniture', 15),
                    ('Tablet', '10-inch tablet with stylus', 429.99, 'Electronics', 35),
                    ('Smart Watch', 'Fitness tracking smart watch', 159.99, 'Wearables', 50),
                    ('Desk', 'Modern computer desk', 179.99, 'Furniture', 10),
                    ('Keyboard', 'Mechanical gaming keyboard', 129.99, 'Computer Accessories', 40),
                    ('Mouse', 'Wireless gaming mouse', 59.99, 'Computer Accessories', 60),
                    ('Speakers', 'Bluetooth speakers', 79.99, 'Audio', 45),
                    ('External SSD', '1TB portable SSD drive', 149.99, 'Storage', 30),
                    ('Webcam', 'HD webcam for video conferencing', 69.99, 'Computer Accessories', 25),
                    ('Printer', 'Color laser printer', 299.99, 'Office Equipment', 12)",
            )
            .execute(pool)
            .await
            .map_err(|e| EngineError::connection_failed(e.to_string()))?;
        }

        Ok(())
    }

    /// Converts a SQLx row to our universal Row type
    fn convert_row(mysql_row: &MySqlRow) -> Row {
        let values: Vec<Value> = mysql_row
            .columns()
            .iter()
            .map(|col| Self::extract_value(mysql_row, col.ordinal()))
            .collect();

        Row { values }
    }

    /// Extracts a value from a MySqlRow at the given index
    fn extract_value(row: &MySqlRow, idx: usize) -> Value {
        // Try u64 first for BIGINT UNSIGNED columns
        if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
            return v.map(|u| Value::Int(u as i64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return v.map(Value::Int).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
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
        // DECIMAL columns (e.g. the seeded product prices)
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

    fn column_info(row: &MySqlRow) -> Vec<ColumnInfo> {
        row.columns()
            .iter()
            .map(|col| ColumnInfo {
                name: col.name().to_string(),
                data_type: col.type_info().name().to_string(),
            })
            .collect()
    }
}

impl Default for MySqlDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SqlBackend for MySqlDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    async fn is_connected(&self) -> bool {
        self.slot.read().await.is_some()
    }

    async fn connect(&self, url: &str) -> EngineResult<()> {
        let pool = MySqlPoolOptions::new()
            .max_connections(MAX_OPEN_CONNS)
            .min_connections(MAX_IDLE_CONNS)
            .max_lifetime(CONN_MAX_LIFETIME)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .after_connect(|conn, _meta| {
                // Lock-wait timeout is session-scoped; every pooled
                // connection needs it.
                Box::pin(async move {
                    conn.execute("SET innodb_lock_wait_timeout = 5").await?;
                    Ok(())
                })
            })
            .connect(url)
            .await
            .map_err(|e| EngineError::connection_failed(e.to_string()))?;

        for setting in GLOBAL_SAFETY_SETTINGS {
            if let Err(e) = sqlx::query(setting).execute(&pool).await {
                warn!("failed to apply mysql safety setting {:?}: {}", setting, e);
            }
        }

        if let Err(e) = Self::seed(&pool).await {
            pool.close().await;
            return Err(e);
        }

        let previous = self.slot.write().await.replace(pool);
        if let Some(old) = previous {
            old.close().await;
        }

        info!("mysql database connected and initialized");
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
                let mysql_row =
                    item.map_err(|e| EngineError::execution_failed(e.to_string()))?;
                if result.columns.is_empty() {
                    result.columns = Self::column_info(&mysql_row);
                }
                if !result.push_capped(Self::convert_row(&mysql_row)) {
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
