//! Notification source abstraction layer.
//!
//! This module defines the [`NotificationSource`] trait and the shared
//! [`Notification`] type.  The concrete GitHub implementation lives in
//! [`github`].
//!
//! ## Adding a new source
//!
//! 1. Create a new file in this directory (e.g. `gitea.rs`).
//! 2. Define a struct holding the HTTP client and implement
//!    [`NotificationSource`] for it.
//! 3. Add `mod gitea;` below and re-export the struct.
//! 4. Construct it in `main.rs` instead of [`GithubSource`].
//!
//! Timeouts, cancellation, reconciliation and restarts are handled outside
//! the source, so an implementation only has to do one request and map the
//! response.

mod github;
mod notification;

#[cfg(test)]
pub mod fake;

pub use github::GithubSource;
pub use notification::{newest_first, Notification};

#[cfg(test)]
pub use notification::make_notification;

use async_trait::async_trait;

use crate::config::PollConfig;
use crate::error::FetchError;

/// Trait every notification source implements.
///
/// Both calls are made from tokio tasks, so implementations must be
/// `Send + Sync`.  They must not retry internally and must not enforce their
/// own deadline; the caller wraps them with the configured timeout.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    /// Human-readable label used in log lines.
    fn name(&self) -> &str;

    /// Fetch the current notification list using the generation's
    /// credentials and lookback window.
    async fn fetch(&self, config: &PollConfig) -> Result<Vec<Notification>, FetchError>;

    /// Mark a single thread as read on the remote side.
    async fn mark_read(&self, config: &PollConfig, id: &str) -> Result<(), FetchError>;
}
