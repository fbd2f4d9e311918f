//! Statement admission safety
//!
//! The dialect-aware classifier that decides whether a submitted
//! statement may run:
//! - **Blocklist rules**: ordered dialect-agnostic signatures, first
//!   match wins
//! - **Dialect policy**: per-backend supplementary restrictions
//! - **Gatekeeper**: folds both into one verdict and owns the SELECT
//!   row-limit injection
//!
//! Best-effort pattern matching for a sandboxed playground, not a
//! production authorization system.

pub mod gate;
pub mod policy;
pub mod rules;
pub mod types;

pub use gate::{ensure_row_limit, SafetyGate, DEFAULT_ROW_LIMIT};
pub use types::SafetyVerdict;
