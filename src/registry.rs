//! Named background tasks with cancel-and-replace restarts.
//!
//! [`Registry`] keeps at most one live generation per task name.  Restarting
//! a name cancels the running generation first, waits for it to wind down
//! (bounded by a grace period, after which it is aborted) and only then
//! spawns the successor, handing it whatever the predecessor returned.  Two
//! generations of the same name therefore never run at the same time.
//!
//! [`Coordinator`] puts a registry behind an mpsc channel so any part of
//! the program can request restarts while a single task owns the map.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::CoordinatorError;

/// How long a cancelled generation may take to exit before it is aborted.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(2);

/// Everything a new generation starts with.
pub struct Generation<T> {
    /// Monotonic id, unique across all names in one registry.
    pub id: u64,
    pub name: String,
    /// Fires when this generation is replaced, stopped or shut down.
    pub cancel: CancellationToken,
    /// What the previous generation of this name returned, if it exited
    /// cleanly within the grace period.
    pub previous: Option<T>,
}

/// Builds the future of a new generation.
pub type TaskFactory<T> = Box<dyn FnOnce(Generation<T>) -> BoxFuture<'static, T> + Send>;

/// Box an async closure into a [`TaskFactory`].
pub fn factory<T, F, Fut>(f: F) -> TaskFactory<T>
where
    F: FnOnce(Generation<T>) -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    Box::new(move |generation| f(generation).boxed())
}

struct TaskHandle<T> {
    generation: u64,
    cancel: CancellationToken,
    join: JoinHandle<T>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct Registry<T> {
    tasks: HashMap<String, TaskHandle<T>>,
    root: CancellationToken,
    next_generation: u64,
    grace: Duration,
}

impl<T: Send + 'static> Registry<T> {
    pub fn new(grace: Duration) -> Self {
        Self {
            tasks: HashMap::new(),
            root: CancellationToken::new(),
            next_generation: 0,
            grace,
        }
    }

    /// Replace the generation running under `name` with a new one built by
    /// `factory`.  Returns the new generation id.
    pub async fn restart(&mut self, name: &str, factory: TaskFactory<T>) -> u64 {
        if self.tasks.contains_key(name) && !self.is_running(name) {
            tracing::debug!(name, "previous generation already exited");
        }
        let previous = match self.tasks.remove(name) {
            Some(handle) => self.retire(name, handle).await,
            None => None,
        };

        self.next_generation += 1;
        let id = self.next_generation;
        let cancel = self.root.child_token();

        let join = tokio::spawn(factory(Generation {
            id,
            name: name.to_string(),
            cancel: cancel.clone(),
            previous,
        }));

        self.tasks.insert(
            name.to_string(),
            TaskHandle {
                generation: id,
                cancel,
                join,
            },
        );
        tracing::info!(name, generation = id, "Started process");
        id
    }

    /// Cancel and remove `name`, returning what its generation handed back.
    pub async fn stop(&mut self, name: &str) -> Option<T> {
        let handle = self.tasks.remove(name)?;
        self.retire(name, handle).await
    }

    /// Cancel every generation and wait for them to exit.
    pub async fn shutdown(&mut self) {
        self.root.cancel();
        if self.is_empty() {
            return;
        }
        tracing::info!(count = self.len(), "Stopping all processes");
        let names: Vec<String> = self.tasks.keys().cloned().collect();
        for name in names {
            if let Some(handle) = self.tasks.remove(&name) {
                self.retire(&name, handle).await;
            }
        }
    }

    pub fn generation(&self, name: &str) -> Option<u64> {
        self.tasks.get(name).map(|h| h.generation)
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.tasks.get(name).is_some_and(|h| !h.join.is_finished())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    async fn retire(&self, name: &str, mut handle: TaskHandle<T>) -> Option<T> {
        // Signal first; nothing below may run before the old generation has
        // been told to stop.
        handle.cancel.cancel();
        tracing::info!(name, generation = handle.generation, "Cancel process");

        match tokio::time::timeout(self.grace, &mut handle.join).await {
            Ok(Ok(output)) => Some(output),
            Ok(Err(e)) => {
                tracing::warn!(name, generation = handle.generation, "process ended abnormally: {e}");
                None
            }
            Err(_) => {
                tracing::warn!(
                    name,
                    generation = handle.generation,
                    grace = ?self.grace,
                    "process ignored cancellation, aborting"
                );
                handle.join.abort();
                // Abort lands at the task's next yield; wait for it so the
                // successor never runs alongside this generation.
                let _ = (&mut handle.join).await;
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

enum Request<T> {
    Restart {
        name: String,
        factory: TaskFactory<T>,
        reply: oneshot::Sender<u64>,
    },
    Stop {
        name: String,
        reply: oneshot::Sender<bool>,
    },
    Generation {
        name: String,
        reply: oneshot::Sender<Option<u64>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to the task that owns a [`Registry`].
pub struct Coordinator<T> {
    tx: mpsc::Sender<Request<T>>,
}

impl<T> Clone for Coordinator<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send + 'static> Coordinator<T> {
    /// Move `registry` into a new coordinator task.
    pub fn spawn(registry: Registry<T>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(16);
        let join = tokio::spawn(run_coordinator(registry, rx));
        (Self { tx }, join)
    }

    pub async fn restart(
        &self,
        name: impl Into<String>,
        factory: TaskFactory<T>,
    ) -> Result<u64, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Restart {
            name: name.into(),
            factory,
            reply,
        })
        .await?;
        rx.await.map_err(|_| CoordinatorError::Closed)
    }

    /// Returns `false` when nothing was running under `name`.
    pub async fn stop(&self, name: impl Into<String>) -> Result<bool, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Stop {
            name: name.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| CoordinatorError::Closed)
    }

    pub async fn generation(&self, name: impl Into<String>) -> Result<Option<u64>, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Generation {
            name: name.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| CoordinatorError::Closed)
    }

    /// Stop every task and end the coordinator.
    pub async fn shutdown(&self) -> Result<(), CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Shutdown { reply }).await?;
        rx.await.map_err(|_| CoordinatorError::Closed)
    }

    async fn send(&self, request: Request<T>) -> Result<(), CoordinatorError> {
        self.tx
            .send(request)
            .await
            .map_err(|_| CoordinatorError::Closed)
    }
}

async fn run_coordinator<T: Send + 'static>(
    mut registry: Registry<T>,
    mut rx: mpsc::Receiver<Request<T>>,
) {
    while let Some(request) = rx.recv().await {
        match request {
            Request::Restart {
                name,
                factory,
                reply,
            } => {
                let id = registry.restart(&name, factory).await;
                let _ = reply.send(id);
            }
            Request::Stop { name, reply } => {
                let existed = registry.generation(&name).is_some();
                registry.stop(&name).await;
                let _ = reply.send(existed);
            }
            Request::Generation { name, reply } => {
                let _ = reply.send(registry.generation(&name));
            }
            Request::Shutdown { reply } => {
                registry.shutdown().await;
                let _ = reply.send(());
                tracing::debug!("coordinator shut down");
                return;
            }
        }
    }

    // Every handle was dropped without an explicit shutdown.
    registry.shutdown().await;
}
