//! Errors surfaced by the metrics retrieval workflow.
//!
//! Only failures that block producing a result propagate to callers.
//! Every variant renders a message safe to show to an end user; internal
//! detail goes to the log, never into these strings.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    /// Input was not a scheme-qualified hostname URL.
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),

    /// The identity has used up its searches for the current day.
    #[error("Daily search limit reached ({limit} searches per day). Please try again tomorrow.")]
    QuotaExceeded { limit: u32 },

    /// The metrics source failed or timed out. Safe to retry.
    #[error("Failed to fetch website metrics. Please try again.")]
    UpstreamFailure,
}

impl CheckError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            CheckError::InvalidUrl(_) => "invalid_url",
            CheckError::QuotaExceeded { .. } => "quota_exceeded",
            CheckError::UpstreamFailure => "upstream_failure",
        }
    }
}
