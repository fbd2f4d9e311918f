// SPDX-License-Identifier: Apache-2.0

//! Dialect-agnostic blocklist rules
//!
//! A static ordered table of unsafe-statement signatures, evaluated
//! against the case-folded statement text with first-match-wins
//! semantics. This is a best-effort heuristic over raw text, not a
//! grammar: a pattern matches anywhere in the statement, not just at
//! clause boundaries.

use regex::Regex;
use tracing::warn;

/// One blocklist entry: a regex source and the denial message shown to
/// the caller when it matches.
struct RuleSpec {
    pattern: &'static str,
    message: &'static str,
}

/// Priority-ordered blocklist. Earlier rules win, so the broad
/// destructive operations come before the narrower injection shapes.
const BLOCKED_PATTERNS: &[RuleSpec] = &[
    RuleSpec {
        pattern: r"drop\s+(database|schema|user)",
        message: "DROP DATABASE/SCHEMA/USER operations are not allowed",
    },
    RuleSpec {
        pattern: r"truncate\s+database",
        message: "TRUNCATE DATABASE operations are not allowed",
    },
    RuleSpec {
        pattern: r"delete\s+from\s+(user|users|permission|permissions|role|roles|account|accounts)",
        message: "DELETE operations on sensitive tables are not allowed",
    },
    RuleSpec {
        pattern: r"alter\s+user",
        message: "ALTER USER operations are not allowed",
    },
    RuleSpec {
        pattern: r"grant\s+all",
        message: "GRANT ALL operations are not allowed",
    },
    RuleSpec {
        pattern: r"revoke\s+all",
        message: "REVOKE ALL operations are not allowed",
    },
    RuleSpec {
        pattern: r"shutdown",
        message: "SHUTDOWN operations are not allowed",
    },
    RuleSpec {
        pattern: r"create\s+(database|schema)",
        message: "CREATE DATABASE/SCHEMA operations are not allowed",
    },
    RuleSpec {
        pattern: r"drop\s+table",
        message: "DROP TABLE operations are not allowed in this playground",
    },
    RuleSpec {
        pattern: r"alter\s+table\s+\w+\s+drop\s+column",
        message: "ALTER TABLE DROP COLUMN operations are not allowed",
    },
    RuleSpec {
        pattern: r"delete\s+from\s+\w+\s+where\s+1\s*=\s*1",
        message: "DELETE all records operations are not allowed",
    },
    RuleSpec {
        pattern: r"update\s+\w+\s+set\s+.+where\s+1\s*=\s*1",
        message: "UPDATE all records operations are not allowed",
    },
    RuleSpec {
        pattern: r"(;|--)\s*(drop|delete|update|insert|alter|create)",
        message: "SQL injection attempts are not allowed",
    },
];

/// A compiled blocklist rule
pub struct BlockRule {
    regex: Regex,
    pub message: &'static str,
}

/// The ordered, compiled rule table
pub struct RuleSet {
    rules: Vec<BlockRule>,
}

impl RuleSet {
    /// Compiles the built-in table. A pattern that fails to compile is
    /// dropped with a warning so one bad rule cannot disable the rest.
    pub fn builtin() -> Self {
        let rules = BLOCKED_PATTERNS
            .iter()
            .filter_map(|spec| match Regex::new(spec.pattern) {
                Ok(regex) => Some(BlockRule {
                    regex,
                    message: spec.message,
                }),
                Err(e) => {
                    warn!("invalid blocklist pattern {:?}: {}", spec.pattern, e);
                    None
                }
            })
            .collect();

        Self { rules }
    }

    /// Returns the first rule matching the case-folded statement, if any.
    pub fn first_match(&self, sql_lower: &str) -> Option<&BlockRule> {
        self.rules.iter().find(|rule| rule.regex.is_match(sql_lower))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_message(sql: &str) -> Option<&'static str> {
        let rules = RuleSet::builtin();
        rules.first_match(&sql.to_lowercase()).map(|r| r.message)
    }

    #[test]
    fn all_builtin_patterns_compile() {
        assert_eq!(RuleSet::builtin().len(), BLOCKED_PATTERNS.len());
    }

    #[test]
    fn destructive_ddl_is_blocked() {
        assert_eq!(
            first_message("DROP DATABASE testdb"),
            Some("DROP DATABASE/SCHEMA/USER operations are not allowed")
        );
        assert_eq!(
            first_message("drop table accounts"),
            Some("DROP TABLE operations are not allowed in this playground")
        );
        assert_eq!(
            first_message("ALTER TABLE products DROP COLUMN price"),
            Some("ALTER TABLE DROP COLUMN operations are not allowed")
        );
    }

    #[test]
    fn sensitive_table_deletes_are_blocked() {
        assert_eq!(
            first_message("DELETE FROM users"),
            Some("DELETE operations on sensitive tables are not allowed")
        );
        assert_eq!(
            first_message("delete from permissions where id = 4"),
            Some("DELETE operations on sensitive tables are not allowed")
        );
    }

    #[test]
    fn tautological_mass_mutations_are_blocked() {
        assert_eq!(
            first_message("DELETE FROM widgets WHERE 1=1"),
            Some("DELETE all records operations are not allowed")
        );
        assert_eq!(
            first_message("UPDATE widgets SET price = 0 WHERE 1 = 1"),
            Some("UPDATE all records operations are not allowed")
        );
    }

    #[test]
    fn stacked_statement_injection_is_blocked() {
        assert_eq!(
            first_message("SELECT * FROM t; DROP VIEW v"),
            Some("SQL injection attempts are not allowed")
        );
        assert_eq!(
            first_message("SELECT 1 --update t set x = 1"),
            Some("SQL injection attempts are not allowed")
        );
    }

    #[test]
    fn first_match_wins_over_later_rules() {
        // Matches both the DROP DATABASE rule and the injection rule;
        // priority order picks the earlier one.
        assert_eq!(
            first_message("SELECT 1; DROP DATABASE testdb"),
            Some("DROP DATABASE/SCHEMA/USER operations are not allowed")
        );
    }

    #[test]
    fn matching_ignores_case_and_position() {
        assert_eq!(
            first_message("  select 1 where exists (select * from t); ShUtDoWn"),
            Some("SHUTDOWN operations are not allowed")
        );
    }

    #[test]
    fn plain_reads_pass() {
        assert_eq!(first_message("SELECT * FROM test_data"), None);
        assert_eq!(first_message("INSERT INTO test_data VALUES (11, 'x', 1)"), None);
    }
}
