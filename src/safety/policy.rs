//! Per-dialect statement policy
//!
//! Supplementary deny rules layered after the dialect-agnostic
//! blocklist: system-catalog protection, session-setting mutation, and
//! the PostgreSQL dangerous-function list. Checks are plain substring
//! scans over the case-folded text and return on the first violation.
//!
//! The dangerous-function list is intentionally PostgreSQL-only: the
//! equivalent MySQL/SQLite built-ins are not mirrored here, so e.g.
//! `pg_sleep` in a MySQL statement passes this layer.

use crate::engine::types::Dialect;
use crate::safety::types::SafetyVerdict;

/// PostgreSQL built-ins that reach the filesystem, sleep, or move data
/// in and out of the server.
const POSTGRES_BLOCKED_FUNCTIONS: &[&str] = &[
    "pg_read_file",
    "pg_ls_dir",
    "pg_sleep",
    "copy",
    "lo_import",
    "lo_export",
    "pg_catalog.pg_file_write",
    "pg_catalog.pg_read_binary_file",
];

const MUTATION_KEYWORDS: &[&str] = &["insert", "update", "delete", "alter"];

/// Runs the supplementary checks for one dialect. Absence of any
/// violation means "safe" for this layer only; the dialect-agnostic
/// blocklist has already run.
pub fn check(dialect: Dialect, sql_lower: &str) -> SafetyVerdict {
    match dialect {
        Dialect::Sqlite => check_sqlite(sql_lower),
        Dialect::Mysql => check_mysql(sql_lower),
        Dialect::Postgresql => check_postgresql(sql_lower),
    }
}

fn contains_any(sql_lower: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| sql_lower.contains(needle))
}

fn check_sqlite(sql_lower: &str) -> SafetyVerdict {
    // Session pragmas that change durability or recovery behavior
    if sql_lower.contains("pragma")
        && contains_any(sql_lower, &["journal_mode", "synchronous", "secure_delete"])
    {
        return SafetyVerdict::denied(
            "PRAGMA statements that modify database settings are not allowed",
        );
    }

    // Attaching a second file would let a session escape the sandbox
    if sql_lower.contains("attach database") {
        return SafetyVerdict::denied("ATTACH DATABASE operations are not allowed");
    }

    SafetyVerdict::allowed()
}

fn check_mysql(sql_lower: &str) -> SafetyVerdict {
    if contains_any(
        sql_lower,
        &["mysql.", "information_schema.", "performance_schema."],
    ) && contains_any(sql_lower, MUTATION_KEYWORDS)
    {
        return SafetyVerdict::denied("Modifying system tables is not allowed");
    }

    if sql_lower.contains("set global") || sql_lower.contains("set @@global") {
        return SafetyVerdict::denied("Setting global variables is not allowed");
    }

    SafetyVerdict::allowed()
}

fn check_postgresql(sql_lower: &str) -> SafetyVerdict {
    if sql_lower.contains("pg_") && contains_any(sql_lower, MUTATION_KEYWORDS) {
        return SafetyVerdict::denied("Modifying system catalogs is not allowed");
    }

    for function in POSTGRES_BLOCKED_FUNCTIONS {
        if sql_lower.contains(function) {
            return SafetyVerdict::denied(format!(
                "Usage of potentially dangerous functions is not allowed: {}",
                function
            ));
        }
    }

    SafetyVerdict::allowed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(dialect: Dialect, sql: &str) -> SafetyVerdict {
        check(dialect, &sql.to_lowercase())
    }

    #[test]
    fn sqlite_blocks_behavior_pragmas() {
        assert!(verdict(Dialect::Sqlite, "PRAGMA journal_mode = OFF").is_denied());
        assert!(verdict(Dialect::Sqlite, "pragma synchronous = 0").is_denied());
        assert!(verdict(Dialect::Sqlite, "PRAGMA secure_delete = false").is_denied());
        // Read-only pragmas stay usable
        assert!(verdict(Dialect::Sqlite, "PRAGMA table_info(test_data)").allowed);
    }

    #[test]
    fn sqlite_blocks_attach() {
        assert!(verdict(Dialect::Sqlite, "ATTACH DATABASE '/tmp/other.db' AS other").is_denied());
    }

    #[test]
    fn mysql_blocks_system_namespace_mutations() {
        assert!(verdict(Dialect::Mysql, "UPDATE mysql.user SET host = '%'").is_denied());
        assert!(verdict(Dialect::Mysql, "DELETE FROM performance_schema.threads").is_denied());
        // Reading the catalog is fine
        assert!(verdict(Dialect::Mysql, "SELECT * FROM information_schema.tables").allowed);
    }

    #[test]
    fn mysql_blocks_global_variable_mutation() {
        assert!(verdict(Dialect::Mysql, "SET GLOBAL max_connections = 10000").is_denied());
        assert!(verdict(Dialect::Mysql, "SET @@GLOBAL.sql_mode = ''").is_denied());
        assert!(verdict(Dialect::Mysql, "SET @x = 1").allowed);
    }

    #[test]
    fn postgres_blocks_catalog_mutations() {
        assert!(verdict(Dialect::Postgresql, "UPDATE pg_authid SET rolsuper = true").is_denied());
        assert!(verdict(Dialect::Postgresql, "SELECT * FROM pg_stat_activity").allowed);
    }

    #[test]
    fn postgres_blocks_dangerous_functions() {
        let verdict = verdict(Dialect::Postgresql, "SELECT pg_sleep(10)");
        assert!(verdict.is_denied());
        assert!(verdict.reason.unwrap().contains("pg_sleep"));
    }

    #[test]
    fn function_blocklist_is_not_mirrored_across_dialects() {
        // Intentional asymmetry: the Postgres-only list does not apply
        // to MySQL or SQLite statements.
        assert!(verdict(Dialect::Mysql, "SELECT pg_sleep(10)").allowed);
        assert!(verdict(Dialect::Sqlite, "SELECT pg_sleep(10)").allowed);
    }
}
