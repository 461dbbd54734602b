//! Background notification polling.
//!
//! One generation of the poller is a single tokio task running
//! [`run_loop`]: fetch, hand the result to the [`Consumer`], sleep, repeat,
//! until its [`CancellationToken`] fires.  Replacing a generation is the
//! registry's job (see [`crate::registry`]); this module only guarantees
//! that a cancelled generation stops promptly and never delivers a result
//! after it was cancelled.
//!
//! ## For contributors
//!
//! Cancellation is cooperative.  It is observed at three points: during the
//! fetch (raced in [`crate::fetch::fetch`]), right after the fetch returns,
//! and during the inter-cycle sleep.  Keep any new await point inside one
//! of those or race it against the token the same way.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::config::PollConfig;
use crate::error::FetchError;
use crate::fetch;
use crate::source::{Notification, NotificationSource};

/// Receives the outcome of every delivered poll cycle.
///
/// Runs on the loop's task and delays the next cycle while it runs, so it
/// must return promptly.
pub trait Consumer: Send {
    fn consume(&mut self, result: Result<Vec<Notification>, FetchError>);
}

impl<F> Consumer for F
where
    F: FnMut(Result<Vec<Notification>, FetchError>) + Send,
{
    fn consume(&mut self, result: Result<Vec<Notification>, FetchError>) {
        self(result)
    }
}

/// What happened to one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The consumer received the result (success or error).
    Delivered,
    /// The generation was cancelled; the result was dropped.
    Discarded,
}

/// Supervised loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Sleeping,
    Cancelled,
}

/// Sleep for `duration` unless `token` fires first.  Returns `true` when
/// cancelled.
pub async fn sleep_or_cancel(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => true,
        _ = sleep(duration) => false,
    }
}

/// Run a single poll cycle.
pub async fn run_once<C: Consumer + ?Sized>(
    source: &dyn NotificationSource,
    config: &PollConfig,
    cancel: &CancellationToken,
    consumer: &mut C,
) -> CycleOutcome {
    let result = fetch::fetch(source, config, cancel).await;

    // A result that arrives after cancellation belongs to a superseded
    // generation and must not reach the consumer.
    if cancel.is_cancelled() {
        tracing::debug!(source = source.name(), "cancelled during fetch, discarding result");
        return CycleOutcome::Discarded;
    }
    if matches!(result, Err(FetchError::Cancelled)) {
        return CycleOutcome::Discarded;
    }

    consumer.consume(result);
    CycleOutcome::Delivered
}

/// Poll until `cancel` fires, then give the consumer back.
///
/// A failed cycle is reported to the consumer and the loop carries on
/// sleeping as usual; only cancellation ends it.
pub async fn run_loop<C: Consumer>(
    source: Arc<dyn NotificationSource>,
    config: PollConfig,
    cancel: CancellationToken,
    mut consumer: C,
) -> C {
    tracing::info!(
        source = source.name(),
        period = ?config.period,
        timeout = ?config.timeout,
        "Start notification loop"
    );

    let mut state = LoopState::Running;
    let mut cycles: u64 = 0;

    loop {
        state = match state {
            LoopState::Running => {
                cycles += 1;
                let outcome = run_once(source.as_ref(), &config, &cancel, &mut consumer).await;
                tracing::debug!(cycle = cycles, ?outcome, "poll cycle finished");
                if cancel.is_cancelled() {
                    LoopState::Cancelled
                } else {
                    LoopState::Sleeping
                }
            }
            LoopState::Sleeping => {
                tracing::debug!(period = ?config.period, "Wait for next loop");
                if sleep_or_cancel(&cancel, config.period).await {
                    LoopState::Cancelled
                } else {
                    LoopState::Running
                }
            }
            LoopState::Cancelled => break,
        };
    }

    tracing::info!(source = source.name(), cycles, "Notification loop stopped");
    consumer
}
