// SPDX-License-Identifier: Apache-2.0

//! Safety Gatekeeper
//!
//! Folds the dialect-agnostic blocklist and the per-dialect policy into
//! one verdict per submitted statement, and owns the SELECT row-limit
//! injection transform. Evaluation is pure: nothing here touches a
//! connection, and every statement must pass through here before the
//! lifecycle manager will be asked for one.

use std::sync::OnceLock;

use regex::Regex;

use crate::engine::types::Dialect;
use crate::safety::policy;
use crate::safety::rules::RuleSet;
use crate::safety::types::SafetyVerdict;

/// Default row cap appended to unbounded SELECT statements.
pub const DEFAULT_ROW_LIMIT: u32 = 100;

/// Statement admission gate
pub struct SafetyGate {
    rules: RuleSet,
}

impl SafetyGate {
    pub fn new() -> Self {
        Self {
            rules: RuleSet::builtin(),
        }
    }

    /// Evaluates one statement for the given dialect.
    ///
    /// Case-folds the text, runs the ordered blocklist (first match
    /// wins), then the dialect's supplementary policy. Empty input is
    /// rejected outright.
    pub fn evaluate(&self, sql: &str, dialect: Dialect) -> SafetyVerdict {
        if sql.trim().is_empty() {
            return SafetyVerdict::denied("SQL statement cannot be empty");
        }

        let sql_lower = sql.to_lowercase();

        if let Some(rule) = self.rules.first_match(&sql_lower) {
            return SafetyVerdict::denied(rule.message);
        }

        policy::check(dialect, &sql_lower)
    }

    /// Boundary variant taking the dialect as submitted by the caller.
    /// An unrecognized label is itself a denial.
    pub fn evaluate_raw(&self, sql: &str, dialect: &str) -> SafetyVerdict {
        match dialect.parse::<Dialect>() {
            Ok(dialect) => self.evaluate(sql, dialect),
            Err(_) => SafetyVerdict::denied("Unsupported SQL dialect"),
        }
    }
}

impl Default for SafetyGate {
    fn default() -> Self {
        Self::new()
    }
}

fn limit_present_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A literal count or a bind placeholder both count as "limit present"
    RE.get_or_init(|| Regex::new(r"\s+limit\s+(\d+|\?|\$\d+)").expect("limit pattern"))
}

/// Appends the default row cap to a SELECT statement that has no limit
/// clause yet. Returns the (possibly rewritten) statement and whether a
/// rewrite happened. Idempotent: output text never gets a second cap.
///
/// Runs only after a statement is verdict-approved; non-SELECT
/// statements pass through untouched.
pub fn ensure_row_limit(sql: &str) -> (String, bool) {
    let sql_lower = sql.to_lowercase();

    if !sql_lower.trim_start().starts_with("select") {
        return (sql.to_string(), false);
    }

    if limit_present_re().is_match(&sql_lower) {
        return (sql.to_string(), false);
    }

    (format!("{} LIMIT {}", sql, DEFAULT_ROW_LIMIT), true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocklisted_statement_is_denied_with_rule_message() {
        let gate = SafetyGate::new();

        let verdict = gate.evaluate("DROP TABLE accounts", Dialect::Mysql);
        assert!(verdict.is_denied());
        assert_eq!(
            verdict.reason.as_deref(),
            Some("DROP TABLE operations are not allowed in this playground")
        );
    }

    #[test]
    fn tautology_applies_to_mutations_not_reads() {
        let gate = SafetyGate::new();

        // A tautological read is harmless and passes
        assert!(gate
            .evaluate("select * from widgets where 1=1", Dialect::Sqlite)
            .allowed);

        let verdict = gate.evaluate("DELETE FROM widgets WHERE 1=1", Dialect::Sqlite);
        assert!(verdict.is_denied());
        assert_eq!(
            verdict.reason.as_deref(),
            Some("DELETE all records operations are not allowed")
        );
    }

    #[test]
    fn dialect_policy_runs_after_the_blocklist() {
        let gate = SafetyGate::new();

        assert!(gate
            .evaluate("SELECT pg_sleep(10)", Dialect::Postgresql)
            .is_denied());
        // Cross-dialect functions are not universally blocked
        assert!(gate.evaluate("SELECT pg_sleep(10)", Dialect::Mysql).allowed);
    }

    #[test]
    fn empty_statement_is_denied() {
        let gate = SafetyGate::new();
        assert!(gate.evaluate("   ", Dialect::Sqlite).is_denied());
    }

    #[test]
    fn unknown_dialect_label_is_denied() {
        let gate = SafetyGate::new();

        let verdict = gate.evaluate_raw("SELECT 1", "oracle");
        assert!(verdict.is_denied());
        assert_eq!(verdict.reason.as_deref(), Some("Unsupported SQL dialect"));

        assert!(gate.evaluate_raw("SELECT 1", "sqlite").allowed);
    }

    #[test]
    fn unbounded_select_gets_the_default_cap() {
        assert_eq!(
            ensure_row_limit("SELECT * FROM test"),
            ("SELECT * FROM test LIMIT 100".to_string(), true)
        );
    }

    #[test]
    fn existing_limit_is_left_untouched() {
        assert_eq!(
            ensure_row_limit("SELECT * FROM test LIMIT 10;"),
            ("SELECT * FROM test LIMIT 10;".to_string(), false)
        );
    }

    #[test]
    fn placeholder_limit_counts_as_present() {
        assert_eq!(
            ensure_row_limit("SELECT * FROM test LIMIT ?;"),
            ("SELECT * FROM test LIMIT ?;".to_string(), false)
        );
        assert_eq!(
            ensure_row_limit("SELECT * FROM test LIMIT $1"),
            ("SELECT * FROM test LIMIT $1".to_string(), false)
        );
    }

    #[test]
    fn non_select_is_never_rewritten() {
        assert_eq!(
            ensure_row_limit("INSERT INTO t VALUES (1)"),
            ("INSERT INTO t VALUES (1)".to_string(), false)
        );
    }

    #[test]
    fn rewrite_is_idempotent() {
        let (once, rewritten) = ensure_row_limit("select name from test_data");
        assert!(rewritten);

        let (twice, rewritten_again) = ensure_row_limit(&once);
        assert!(!rewritten_again);
        assert_eq!(once, twice);
    }
}
