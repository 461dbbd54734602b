//! Reconciliation: which fetched notifications are new.

use std::collections::HashSet;

use crate::source::Notification;

/// Notifications in `fresh` whose `id` does not appear in `accepted`.
///
/// Keeps `fresh` order and drops repeated ids after their first occurrence.
/// With an empty `accepted` every fetched item counts as new, so the very
/// first successful poll announces everything.
pub fn diff(fresh: &[Notification], accepted: &[Notification]) -> Vec<Notification> {
    let known: HashSet<&str> = accepted.iter().map(|n| n.id.as_str()).collect();
    let mut seen = HashSet::with_capacity(fresh.len());

    fresh
        .iter()
        .filter(|n| !known.contains(n.id.as_str()))
        .filter(|n| seen.insert(n.id.as_str()))
        .cloned()
        .collect()
}
