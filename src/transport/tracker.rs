//! Actor identity and liveness accounting.
//!
//! # Responsibilities
//! - Generate unique actor IDs for tracing
//! - Count running actor tasks per transport
//! - Let tests and health checks confirm no actor outlived its request

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::observability::metrics;

/// Global atomic counter for actor IDs.
/// Relaxed ordering is enough: only uniqueness matters.
static ACTOR_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(u64);

impl ActorId {
    /// Generate a new unique actor ID.
    pub fn new() -> Self {
        Self(ACTOR_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "actor-{}", self.0)
    }
}

/// Counts live actor tasks.
#[derive(Debug, Clone, Default)]
pub struct ActorTracker {
    live: Arc<AtomicU64>,
}

impl ActorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new actor. The guard must live inside the actor task.
    pub fn track(&self) -> ActorGuard {
        self.live.fetch_add(1, Ordering::SeqCst);
        metrics::record_actor_started();
        ActorGuard {
            live: Arc::clone(&self.live),
            id: ActorId::new(),
        }
    }

    /// Number of actor tasks still running.
    pub fn live_count(&self) -> u64 {
        self.live.load(Ordering::SeqCst)
    }

    /// Wait until every tracked actor has exited, or the timeout passes.
    /// Returns true if the count reached zero.
    pub async fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.live_count() > 0 {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        true
    }
}

/// Held by an actor task for its whole life; decrements the count on drop,
/// including when the task is aborted.
#[derive(Debug)]
pub struct ActorGuard {
    live: Arc<AtomicU64>,
    id: ActorId,
}

impl ActorGuard {
    pub fn id(&self) -> ActorId {
        self.id
    }
}

impl Drop for ActorGuard {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        metrics::record_actor_stopped();
        tracing::trace!(actor_id = %self.id, "Actor exited");
    }
}
