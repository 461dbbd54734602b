//! Owner of the accepted notification list and the consumer that feeds the
//! front end.
//!
//! [`Inbox`] holds the accepted set and applies one poll result at a time.
//! [`InboxConsumer`] wraps it for the poll loop: after every result it fires
//! at most one [`Alert`] and publishes a render-facing [`Snapshot`] on a
//! `watch` channel.  Nothing outside the running generation can reach the
//! accepted set itself.

use std::sync::Arc;

use tokio::sync::watch;

use crate::alert::{Alert, Alerter};
use crate::error::FetchError;
use crate::poll::Consumer;
use crate::reconcile;
use crate::source::{newest_first, Notification};

/// What the front end should show next to (or instead of) the list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Status {
    /// No cycle has completed yet.
    #[default]
    Loading,
    /// The last fetch returned at least one notification.
    Ready,
    /// The last fetch succeeded with an empty list.
    NoNotifications,
    /// The last fetch failed; the list has been cleared.
    Failed(String),
}

impl Status {
    pub fn label(&self) -> String {
        match self {
            Status::Loading => "Loading...".to_string(),
            Status::Ready => "Notifications".to_string(),
            Status::NoNotifications => "No New Notifications".to_string(),
            Status::Failed(msg) => format!("Failed to fetch notifications: {msg}"),
        }
    }
}

/// Read-only copy of the inbox handed to the front end.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub generation: u64,
    pub status: Status,
    /// Most recently updated first.
    pub notifications: Vec<Notification>,
}

// ---------------------------------------------------------------------------
// Inbox
// ---------------------------------------------------------------------------

/// The accepted set plus the display status derived from the last result.
#[derive(Debug, Default)]
pub struct Inbox {
    accepted: Vec<Notification>,
    status: Status,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one poll result.
    ///
    /// On success the accepted set is replaced wholesale and an alert is
    /// returned if any id was not accepted before.  On failure the accepted
    /// set is cleared so stale data is never shown as current.
    pub fn apply(&mut self, result: Result<Vec<Notification>, FetchError>) -> Option<Alert> {
        match result {
            Ok(fresh) => {
                let new_items = reconcile::diff(&fresh, &self.accepted);
                self.accepted = fresh;
                self.status = if self.accepted.is_empty() {
                    Status::NoNotifications
                } else {
                    Status::Ready
                };
                (!new_items.is_empty()).then(|| Alert {
                    count: new_items.len(),
                })
            }
            // Superseded generation: not ours to display.
            Err(e) if e.is_cancellation() => None,
            Err(e) => {
                self.accepted.clear();
                self.status = Status::Failed(e.to_string());
                None
            }
        }
    }

    pub fn accepted(&self) -> &[Notification] {
        &self.accepted
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn snapshot(&self, generation: u64) -> Snapshot {
        let mut notifications = self.accepted.clone();
        notifications.sort_by(newest_first);
        Snapshot {
            generation,
            status: self.status.clone(),
            notifications,
        }
    }
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

/// Poll-loop consumer: updates the inbox, alerts, publishes a snapshot.
///
/// Moved into the generation that runs it and handed back when that
/// generation ends, so a restart keeps the accepted set without sharing it.
pub struct InboxConsumer {
    inbox: Inbox,
    generation: u64,
    alerter: Arc<dyn Alerter>,
    view: watch::Sender<Snapshot>,
}

impl InboxConsumer {
    pub fn new(generation: u64, alerter: Arc<dyn Alerter>, view: watch::Sender<Snapshot>) -> Self {
        Self {
            inbox: Inbox::new(),
            generation,
            alerter,
            view,
        }
    }

    /// Re-tag a predecessor's consumer for the generation taking it over.
    pub fn into_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn publish(&self) {
        self.view.send_replace(self.inbox.snapshot(self.generation));
    }
}

impl Consumer for InboxConsumer {
    fn consume(&mut self, result: Result<Vec<Notification>, FetchError>) {
        if let Err(e) = &result {
            tracing::warn!(generation = self.generation, "fetch failed: {e}");
            if e.is_auth() {
                tracing::warn!("set a new token with `token <value>`");
            }
        }

        if let Some(alert) = self.inbox.apply(result) {
            self.alerter.alert(&alert);
        }

        tracing::debug!(
            generation = self.generation,
            accepted = self.inbox.accepted().len(),
            status = ?self.inbox.status(),
            "inbox updated"
        );
        self.publish();
    }
}
