//! The notification record shared by every part of the poller.
//!
//! A [`Notification`] is created by a source's `fetch()` and never mutated
//! afterwards.  Read-state changes happen remotely (see
//! [`NotificationSource::mark_read`](super::NotificationSource::mark_read))
//! and show up on the next fetch as a fresh value.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// A single notification thread, normalised from the remote source.
///
/// ## Identity
///
/// Two notifications are "the same" iff their [`id`](Self::id)s are equal.
/// The derived `PartialEq` compares every field and is only used by tests;
/// reconciliation goes through `id` alone.
///
/// ## Sorting
///
/// There is no `Ord` impl, since an ordering on `(updated_at, id)` would
/// disagree with the field-wise `Eq`.  Sort with [`newest_first`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Notification {
    /// Opaque thread id, unique within the source.
    pub id: String,

    /// Title of the issue, pull request, release, etc.
    pub subject_title: String,

    /// Kind of subject as reported by the source (e.g. `PullRequest`).
    pub subject_type: String,

    /// API URL of the subject, when the source provides one.
    pub subject_url: Option<String>,

    /// `owner/name` of the repository the thread belongs to.
    pub repository_name: String,

    /// Why the user was notified (`mention`, `review_requested`, ...).
    pub reason: String,

    /// Last time the thread changed on the remote side.
    pub updated_at: DateTime<Utc>,

    /// Remote read state at fetch time.
    pub unread: bool,
}

// ---------------------------------------------------------------------------
// Ordering: most recently updated first
// ---------------------------------------------------------------------------

/// Comparator for `sort_by`: newest first, then id so the order is total.
pub fn newest_first(a: &Notification, b: &Notification) -> Ordering {
    b.updated_at
        .cmp(&a.updated_at)
        .then_with(|| a.id.cmp(&b.id))
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Shorthand constructor shared by tests across the crate.
#[cfg(test)]
pub fn make_notification(id: &str, title: &str) -> Notification {
    use chrono::TimeZone;

    Notification {
        id: id.to_string(),
        subject_title: title.to_string(),
        subject_type: "Issue".to_string(),
        subject_url: None,
        repository_name: "octo/repo".to_string(),
        reason: "mention".to_string(),
        updated_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        unread: true,
    }
}
