//! Error types for fetching, remote writes and configuration.

use std::time::Duration;

/// Failure of a single fetch or mark-as-read attempt.
///
/// Everything except [`Cancelled`](FetchError::Cancelled) is shown to the
/// user through the consumer.  Cancellation only means a newer generation
/// took over, so it is dropped silently.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected response (status {status}): {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("credential rejected (status {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl FetchError {
    /// `true` for the rejected-credential case.
    pub fn is_auth(&self) -> bool {
        matches!(self, FetchError::Auth { .. })
    }

    /// `true` when the error only reflects a superseded generation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

/// The restart coordinator task has gone away.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("restart coordinator is no longer running")]
    Closed,
}

/// Invalid settings, caught before a poller generation is started.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no GitHub token configured (use --token, GITHUB_TOKEN or the `token` command)")]
    MissingToken,

    #[error("{field} must be at least {min}")]
    TooSmall { field: &'static str, min: u64 },

    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: u64 },

    #[error("timeout ({timeout_secs}s) must not exceed the poll period ({period_secs}s)")]
    TimeoutExceedsPeriod { timeout_secs: u64, period_secs: u64 },
}
