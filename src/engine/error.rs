// SPDX-License-Identifier: Apache-2.0

//! Normalized error types for the playground engine
//!
//! All driver-specific errors are mapped to these unified error types
//! so the transport layer can shape responses without knowing which
//! backing store produced the failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::types::Dialect;

/// Unified error type for all engine operations
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum EngineError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    /// No live handle for the dialect after the single extra reconnect
    /// attempt. Transient from the caller's point of view.
    #[error("no database connection available for {dialect}")]
    ConnectionUnavailable { dialect: Dialect },

    #[error("Unsupported SQL dialect: {dialect}")]
    UnsupportedDialect { dialect: String },

    /// The approved statement failed at the store. The store's message is
    /// surfaced verbatim; the gatekeeper only judges safety, not
    /// correctness.
    #[error("Query execution error: {message}")]
    ExecutionFailed { message: String },

    #[error("Operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl EngineError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed { message: msg.into() }
    }

    pub fn unavailable(dialect: Dialect) -> Self {
        Self::ConnectionUnavailable { dialect }
    }

    pub fn unsupported_dialect(dialect: impl Into<String>) -> Self {
        Self::UnsupportedDialect { dialect: dialect.into() }
    }

    pub fn execution_failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed { message: msg.into() }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
