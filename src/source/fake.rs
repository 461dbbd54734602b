//! Scripted in-memory source for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{Notification, NotificationSource};
use crate::config::PollConfig;
use crate::error::FetchError;

/// One scripted fetch response.
pub enum Step {
    Items(Vec<Notification>),
    Error(FetchError),
    /// Respond with `items` after `delay`.
    Slow(Duration, Vec<Notification>),
    /// Never respond.
    Hang,
}

type Hook = Box<dyn Fn(usize) + Send + Sync>;

/// Pops one [`Step`] per fetch; once the script runs out every fetch returns
/// the fallback list.
pub struct FakeSource {
    script: Mutex<VecDeque<Step>>,
    fallback: Vec<Notification>,
    fetches: AtomicUsize,
    marked: Mutex<Vec<String>>,
    mark_error: Mutex<Option<FetchError>>,
    on_fetch: Option<Hook>,
}

impl FakeSource {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Vec::new(),
            fetches: AtomicUsize::new(0),
            marked: Mutex::new(Vec::new()),
            mark_error: Mutex::new(None),
            on_fetch: None,
        }
    }

    pub fn with_fallback(mut self, items: Vec<Notification>) -> Self {
        self.fallback = items;
        self
    }

    /// Run `hook(n)` when the n-th fetch (1-based) is about to return.
    pub fn on_fetch(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_fetch = Some(Box::new(hook));
        self
    }

    pub fn fail_mark_read(self, err: FetchError) -> Self {
        *self.mark_error.lock().unwrap() = Some(err);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn marked(&self) -> Vec<String> {
        self.marked.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSource for FakeSource {
    fn name(&self) -> &str {
        "fake"
    }

    async fn fetch(&self, _config: &PollConfig) -> Result<Vec<Notification>, FetchError> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        let step = self.script.lock().unwrap().pop_front();
        let result = match step {
            Some(Step::Items(items)) => Ok(items),
            Some(Step::Error(err)) => Err(err),
            Some(Step::Slow(delay, items)) => {
                tokio::time::sleep(delay).await;
                Ok(items)
            }
            Some(Step::Hang) => std::future::pending().await,
            None => Ok(self.fallback.clone()),
        };
        if let Some(hook) = &self.on_fetch {
            hook(n);
        }
        result
    }

    async fn mark_read(&self, _config: &PollConfig, id: &str) -> Result<(), FetchError> {
        if let Some(err) = self.mark_error.lock().unwrap().take() {
            return Err(err);
        }
        self.marked.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

/// Config with short, test-friendly durations.
pub fn test_config() -> PollConfig {
    PollConfig {
        token: "test-token".into(),
        lookback: Duration::from_secs(86_400),
        timeout: Duration::from_secs(10),
        period: Duration::from_secs(30),
        api_base: "http://127.0.0.1:9".into(),
    }
}
