//! Universal data types for the playground engine
//!
//! These types provide a normalized representation of tabular results
//! across the three supported SQL backends.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::error::EngineError;

/// The three supported SQL backend flavors. Each has its own safety
/// policy and its own connection slot in the lifecycle manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    Mysql,
    Postgresql,
}

impl Dialect {
    pub const ALL: [Dialect; 3] = [Dialect::Sqlite, Dialect::Mysql, Dialect::Postgresql];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Mysql => "mysql",
            Dialect::Postgresql => "postgresql",
        }
    }

    /// Whether the backing store lives behind a network address.
    /// Embedded stores connect synchronously at startup; network stores
    /// get a background retry loop.
    pub fn requires_network(&self) -> bool {
        !matches!(self, Dialect::Sqlite)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Dialect::Sqlite),
            "mysql" => Ok(Dialect::Mysql),
            "postgresql" => Ok(Dialect::Postgresql),
            other => Err(EngineError::unsupported_dialect(other)),
        }
    }
}

/// Unique identifier for one executed statement, used to correlate log
/// lines across the request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryId(pub Uuid);

impl QueryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Universal value representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
    Json(serde_json::Value),
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Column metadata for a result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

/// One result row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    pub values: Vec<Value>,
}

/// Hard cap on extracted rows per executed statement. Bounds per-request
/// memory and response size regardless of what the store would return.
pub const MAX_RESULT_ROWS: usize = 10;

/// Tabular result of one executed statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column information
    pub columns: Vec<ColumnInfo>,
    /// Result rows, at most [`MAX_RESULT_ROWS`]
    pub rows: Vec<Row>,
    /// Number of affected rows (for INSERT/UPDATE/DELETE)
    pub affected_rows: Option<u64>,
    /// Execution time in milliseconds
    pub execution_time_ms: f64,
    /// True when the row cap cut off further results
    pub truncated: bool,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            affected_rows: None,
            execution_time_ms: 0.0,
            truncated: false,
        }
    }

    pub fn with_affected_rows(affected: u64, time_ms: f64) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            affected_rows: Some(affected),
            execution_time_ms: time_ms,
            truncated: false,
        }
    }

    /// Appends a row unless the cap is reached; returns false (and sets
    /// `truncated`) once the cap cuts the stream off.
    pub fn push_capped(&mut self, row: Row) -> bool {
        if self.rows.len() >= MAX_RESULT_ROWS {
            self.truncated = true;
            return false;
        }
        self.rows.push(row);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_round_trip() {
        for dialect in Dialect::ALL {
            assert_eq!(dialect.as_str().parse::<Dialect>().unwrap(), dialect);
        }
        assert_eq!("POSTGRESQL".parse::<Dialect>().unwrap(), Dialect::Postgresql);
    }

    #[test]
    fn unknown_dialect_is_rejected() {
        let err = "oracle".parse::<Dialect>().unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedDialect { .. }));
    }

    #[test]
    fn row_cap_sets_truncated() {
        let mut result = QueryResult::empty();
        for i in 0..MAX_RESULT_ROWS {
            assert!(result.push_capped(Row { values: vec![Value::Int(i as i64)] }));
        }
        assert!(!result.push_capped(Row { values: vec![Value::Null] }));
        assert_eq!(result.rows.len(), MAX_RESULT_ROWS);
        assert!(result.truncated);
    }

    #[test]
    fn value_serializes_untagged() {
        let row = Row {
            values: vec![Value::Int(1), Value::Text("Item 1".into()), Value::Null],
        };
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"[1,"Item 1",null]"#);
    }
}
