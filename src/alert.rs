//! Aggregated "you have new notifications" alerts.
//!
//! One alert per poll cycle at most, carrying only the count.  Delivery is
//! fire-and-forget: a failed toast is logged and otherwise ignored.

/// Summary of the new items found by one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub count: usize,
}

impl Alert {
    pub const TITLE: &'static str = "GitHub Notifications";

    pub fn message(&self) -> String {
        match self.count {
            1 => "You have 1 new notification".to_string(),
            n => format!("You have {n} new notifications"),
        }
    }
}

/// Somewhere to send alerts.
pub trait Alerter: Send + Sync {
    fn alert(&self, alert: &Alert);
}

/// Writes alerts to the log.
pub struct LogAlerter;

impl Alerter for LogAlerter {
    fn alert(&self, alert: &Alert) {
        tracing::info!(count = alert.count, "{}", alert.message());
    }
}

/// Native desktop toast via `notify-rust`.
#[cfg(feature = "desktop")]
pub struct DesktopAlerter {
    pub timeout_ms: u32,
}

#[cfg(feature = "desktop")]
impl Alerter for DesktopAlerter {
    fn alert(&self, alert: &Alert) {
        if let Err(e) = notify_rust::Notification::new()
            .summary(Alert::TITLE)
            .body(&alert.message())
            .timeout(notify_rust::Timeout::Milliseconds(self.timeout_ms))
            .show()
        {
            tracing::warn!("Failed to send desktop notification: {e}");
        }
    }
}
