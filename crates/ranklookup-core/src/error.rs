//! Error types for `RankLookup`.
//!
//! One error type for every core operation. Store failures on the synchronous
//! lookup path surface to the caller; failures inside background
//! repopulation are logged and never reach a requester.

use std::time::Duration;

use thiserror::Error;

use crate::store::QueryKind;

/// Result type alias for `RankLookup` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in `RankLookup` operations.
///
/// Error codes follow the pattern `RANK-XXX`.
#[derive(Error, Debug)]
pub enum Error {
    /// A store query failed (RANK-001).
    #[error("[RANK-001] Store error: {0}")]
    Store(String),

    /// A store query exceeded its deadline (RANK-002).
    #[error("[RANK-002] Store query '{kind}' timed out after {}s", timeout.as_secs())]
    StoreTimeout {
        /// Query shape that timed out.
        kind: QueryKind,
        /// Deadline that was exceeded.
        timeout: Duration,
    },

    /// Ruleset id outside the known rulesets (RANK-003).
    #[error("[RANK-003] Unknown ruleset id {0} (expected 0-3)")]
    InvalidRuleset(u8),

    /// Configuration error (RANK-004).
    #[error("[RANK-004] Configuration error: {0}")]
    Config(String),

    /// Internal invariant violation (RANK-005).
    ///
    /// Indicates a bug. Please report if encountered.
    #[error("[RANK-005] Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the error code (e.g., "RANK-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Store(_) => "RANK-001",
            Self::StoreTimeout { .. } => "RANK-002",
            Self::InvalidRuleset(_) => "RANK-003",
            Self::Config(_) => "RANK-004",
            Self::Internal(_) => "RANK-005",
        }
    }

    /// Returns true if retrying the operation later may succeed.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::StoreTimeout { .. })
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<crate::config::ConfigError> for Error {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
