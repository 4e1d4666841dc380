//! Stopping pool background tasks.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};

/// Stops the background tasks a program started for its pools.
///
/// Tasks such as [`crate::ConnectionPool::spawn_monitor`] take a receiver from
/// [`Shutdown::subscribe`]; their handles are registered with [`Shutdown::track`]
/// so [`Shutdown::complete`] can wait for them.
pub struct Shutdown {
    signal: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (signal, _) = broadcast::channel(1);
        Self {
            signal,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.signal.subscribe()
    }

    /// Register a task to be awaited by `complete`.
    pub fn track(&self, task: JoinHandle<()>) {
        self.tasks.lock().expect("shutdown task list mutex poisoned").push(task);
    }

    /// Signal every subscriber. Does not wait.
    pub fn trigger(&self) {
        let _ = self.signal.send(());
    }

    /// Signal, then wait up to `grace` for tracked tasks to exit.
    ///
    /// Tasks still running at the deadline are aborted. Returns how many were.
    pub async fn complete(self, grace: Duration) -> usize {
        self.trigger();
        let tasks = self
            .tasks
            .into_inner()
            .expect("shutdown task list mutex poisoned");
        let deadline = Instant::now() + grace;

        let mut aborted = 0;
        for mut task in tasks {
            match timeout_at(deadline, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Background task failed during shutdown"),
                Err(_) => {
                    task.abort();
                    aborted += 1;
                }
            }
        }
        if aborted > 0 {
            tracing::warn!(aborted, grace_ms = grace.as_millis() as u64, "Background tasks outlived shutdown grace");
        } else {
            tracing::debug!("Background tasks stopped");
        }
        aborted
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
