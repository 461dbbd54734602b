//! Plain-text formatting of snapshots for the console.
//!
//! Pure string building, kept apart from state ([`crate::app`]) and input
//! ([`crate::input`]).

use crate::app::{Snapshot, Status};
use crate::source::Notification;

/// One line per notification: date, repository, title, reason, id.
pub fn format_line(item: &Notification) -> String {
    let date_str = item.updated_at.format("%Y-%m-%d %H:%M").to_string();
    let marker = if item.unread { "*" } else { " " };
    format!(
        "{marker} {:<17} {:<30} {}  [{}]  #{}",
        date_str, item.repository_name, item.subject_title, item.reason, item.id
    )
}

/// The status line shown above the list.
pub fn status_line(snapshot: &Snapshot) -> String {
    let count = snapshot.notifications.len();
    match snapshot.status {
        Status::Ready => format!("{}: {count}", snapshot.status.label()),
        _ => snapshot.status.label(),
    }
}

/// Status line followed by every notification.
pub fn render(snapshot: &Snapshot) -> String {
    let mut out = status_line(snapshot);
    for item in &snapshot.notifications {
        out.push('\n');
        out.push_str(&format_line(item));
    }
    out
}
