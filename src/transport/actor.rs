//! Connection actor handle.
//!
//! # Responsibilities
//! - Own exactly one actor task and its mailbox
//! - Hand the actor a request together with the recipient of its replies
//! - Terminate the task exactly once, on every exit path
//!
//! # Design Decisions
//! - The handle is not `Clone`: one owner, one in-flight request
//! - `terminate` aborts and then awaits the task, so the actor is gone when it
//!   returns; calling it again is a no-op
//! - `Drop` aborts without waiting, which covers cancelled request futures
//! - Replies sent after termination go to a dropped receiver and are discarded

use std::future::Future;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::error::SendError;
use crate::transport::message::{ActorCommand, OutboundRequest, ReplyTo};
use crate::transport::tracker::{ActorId, ActorTracker};

/// Owned reference to one running connection actor.
#[derive(Debug)]
pub struct ActorHandle {
    id: ActorId,
    commands: mpsc::Sender<ActorCommand>,
    task: Option<JoinHandle<()>>,
}

impl ActorHandle {
    /// Spawn an actor task. `run` receives the actor's id and mailbox and
    /// drives the connection until the mailbox closes or the connection dies.
    pub fn spawn<F, Fut>(tracker: &ActorTracker, run: F) -> Self
    where
        F: FnOnce(ActorId, mpsc::Receiver<ActorCommand>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (commands, mailbox) = mpsc::channel(1);
        let guard = tracker.track();
        let id = guard.id();
        let actor = run(id, mailbox);

        let task = tokio::spawn(async move {
            let _guard = guard;
            actor.await;
        });
        tracing::debug!(actor_id = %id, "Actor started");

        Self {
            id,
            commands,
            task: Some(task),
        }
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    /// True while the actor task is running and has not been terminated.
    pub fn is_alive(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// True once `terminate` has run (or the handle was never started).
    pub fn is_terminated(&self) -> bool {
        self.task.is_none()
    }

    /// Hand a request to the actor. Replies go to `reply_to`.
    pub fn send_request(&self, request: OutboundRequest, reply_to: ReplyTo) -> Result<(), SendError> {
        if !self.is_alive() {
            return Err(SendError::ActorStopped);
        }
        self.commands
            .try_send(ActorCommand::Request { request, reply_to })
            .map_err(|e| match e {
                TrySendError::Full(_) => SendError::Busy,
                TrySendError::Closed(_) => SendError::ActorStopped,
            })
    }

    /// Stop the actor and wait for its task to finish. Idempotent.
    pub async fn terminate(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        task.abort();
        match task.await {
            Ok(()) => tracing::debug!(actor_id = %self.id, "Actor had already exited"),
            Err(e) if e.is_cancelled() => tracing::debug!(actor_id = %self.id, "Actor terminated"),
            Err(e) => tracing::warn!(actor_id = %self.id, error = %e, "Actor panicked"),
        }
    }
}

impl Drop for ActorHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!(actor_id = %self.id, "Actor aborted on drop");
        }
    }
}
