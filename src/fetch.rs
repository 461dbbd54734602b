//! Bounded, cancellable single fetch.
//!
//! Wraps a [`NotificationSource`] call with the generation's timeout and
//! races it against the generation's cancellation token.  Nothing is retried
//! here; the loop simply tries again next period.

use tokio_util::sync::CancellationToken;

use crate::config::PollConfig;
use crate::error::FetchError;
use crate::source::{Notification, NotificationSource};

/// Fetch once from `source`.
///
/// Returns [`FetchError::Cancelled`] without touching the network when
/// `cancel` has already fired, and as soon as it fires mid-request.
pub async fn fetch(
    source: &dyn NotificationSource,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> Result<Vec<Notification>, FetchError> {
    if cancel.is_cancelled() {
        return Err(FetchError::Cancelled);
    }

    tokio::select! {
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        res = tokio::time::timeout(config.timeout, source.fetch(config)) => {
            res.unwrap_or(Err(FetchError::Timeout(config.timeout)))
        }
    }
}

/// Mark one thread read, bounded by the same timeout as a fetch.
pub async fn mark_read(
    source: &dyn NotificationSource,
    config: &PollConfig,
    id: &str,
) -> Result<(), FetchError> {
    tokio::time::timeout(config.timeout, source.mark_read(config, id))
        .await
        .unwrap_or(Err(FetchError::Timeout(config.timeout)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fake::{test_config, FakeSource, Step};
    use crate::source::make_notification;
    use std::time::Duration;

    #[tokio::test]
    async fn returns_source_items() {
        let src = FakeSource::new(vec![Step::Items(vec![make_notification("1", "a")])]);
        let items = fetch(&src, &test_config(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(src.fetch_count(), 1);
    }

    #[tokio::test]
    async fn already_cancelled_scope_skips_the_call() {
        let src = FakeSource::new(vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fetch(&src, &test_config(), &cancel).await.unwrap_err();
        assert!(err.is_cancellation());
        assert_eq!(src.fetch_count(), 0, "network call must not start");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_source_times_out() {
        let src = FakeSource::new(vec![Step::Slow(Duration::from_secs(60), vec![])]);
        let err = fetch(&src, &test_config(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout(d) if d == Duration::from_secs(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_in_flight_request() {
        let src = FakeSource::new(vec![Step::Hang]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let start = tokio::time::Instant::now();
        let err = fetch(&src, &test_config(), &cancel).await.unwrap_err();
        assert!(err.is_cancellation());
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn errors_pass_through_unchanged() {
        let src = FakeSource::new(vec![Step::Error(FetchError::Auth {
            status: 401,
            message: "Bad credentials".into(),
        })]);
        let err = fetch(&src, &test_config(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn mark_read_reaches_source() {
        let src = FakeSource::new(vec![]);
        mark_read(&src, &test_config(), "42").await.unwrap();
        assert_eq!(src.marked(), vec!["42".to_string()]);
    }
}
