//! SQL backend drivers
//!
//! One driver per supported dialect, each implementing [`SqlBackend`]
//! over its own sqlx pool.
//!
//! [`SqlBackend`]: crate::engine::traits::SqlBackend

pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use mysql::MySqlDriver;
pub use postgres::PostgresDriver;
pub use sqlite::SqliteDriver;

use std::time::Duration;

/// Pool ceilings shared by all three drivers. Small on purpose: the
/// playground serves untrusted callers against shared stores.
pub(crate) const MAX_OPEN_CONNS: u32 = 5;
pub(crate) const MAX_IDLE_CONNS: u32 = 2;
pub(crate) const CONN_MAX_LIFETIME: Duration = Duration::from_secs(30 * 60);
pub(crate) const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Heuristic for whether a statement produces a row stream.
///
/// Non-matching statements are executed for their affected-row count
/// instead. This is a prefix check, not a parse; statements it misjudges
/// still run, they just come back without column metadata.
pub(crate) fn returns_rows(sql: &str) -> bool {
    let trimmed = sql.trim_start().as_bytes();
    ["select", "with", "show", "explain", "pragma", "values"]
        .iter()
        .any(|prefix| {
            trimmed.len() >= prefix.len()
                && trimmed[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_prefix_detection() {
        assert!(returns_rows("SELECT * FROM test_data"));
        assert!(returns_rows("  with t as (select 1) select * from t"));
        assert!(returns_rows("PRAGMA table_info(test_data)"));
        assert!(!returns_rows("INSERT INTO test_data VALUES (1, 'x', 2)"));
        assert!(!returns_rows("UPDATE test_data SET value = 0 WHERE id = 1"));
    }
}
