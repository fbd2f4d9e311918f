//! Safety verdict types
//!
//! Type definitions for the statement admission gate.

use serde::{Deserialize, Serialize};

/// Result of a safety check for one submitted statement.
///
/// Produced once per submission and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    /// Whether the statement is allowed to proceed
    pub allowed: bool,
    /// Human-readable denial reason, from the rule that matched
    pub reason: Option<String>,
}

impl SafetyVerdict {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }

    pub fn is_denied(&self) -> bool {
        !self.allowed
    }
}
