//! Pool slots and borrowed connections.

use std::fmt;
use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::pool::manager::PoolInner;
use crate::transport::{ActorHandle, Transport};

/// Stable index of a slot within its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub(crate) usize);

impl SlotId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot-{}", self.0)
    }
}

/// State tag of a slot. Each slot is in exactly one state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// In the idle queue; may hold no actor yet (opened on first checkout).
    Idle,
    /// Borrowed by a caller.
    InUse,
    /// Its actor is being torn down and reopened.
    Replacing,
    /// Replacement failed; the slot no longer counts towards capacity.
    Dead,
    /// The pool was closed and the slot's actor stopped.
    Closed,
}

/// One unit of pool capacity and the actor it currently owns.
#[derive(Debug)]
pub(crate) struct Slot {
    pub(crate) id: SlotId,
    pub(crate) actor: Option<ActorHandle>,
}

impl Slot {
    pub(crate) fn vacant(id: SlotId) -> Self {
        Self { id, actor: None }
    }

    pub(crate) fn is_live(&self) -> bool {
        self.actor.as_ref().is_some_and(ActorHandle::is_alive)
    }
}

/// A slot taken out of the idle queue together with the permit that allowed it.
#[derive(Debug)]
pub(crate) struct Lease {
    pub(crate) slot: Slot,
    pub(crate) permit: OwnedSemaphorePermit,
}

/// An actor borrowed from a pool.
///
/// Return it with `ConnectionPool::checkin` (or `discard`). If it is dropped
/// instead, its actor is treated as suspect and replaced in the background.
pub struct PooledConnection<T: Transport> {
    lease: Option<Lease>,
    pool: Arc<PoolInner<T>>,
}

impl<T: Transport> PooledConnection<T> {
    pub(crate) fn new(lease: Lease, pool: Arc<PoolInner<T>>) -> Self {
        Self {
            lease: Some(lease),
            pool,
        }
    }

    pub fn slot_id(&self) -> Option<SlotId> {
        self.lease.as_ref().map(|lease| lease.slot.id)
    }

    /// The borrowed actor.
    pub fn actor(&self) -> Option<&ActorHandle> {
        self.lease.as_ref().and_then(|lease| lease.slot.actor.as_ref())
    }

    /// Return the slot to the idle queue, or replace its actor if it died
    /// while borrowed.
    pub(crate) fn checkin(mut self) {
        let Some(lease) = self.lease.take() else {
            return;
        };
        if lease.slot.is_live() {
            self.pool.restore(lease);
        } else {
            tracing::warn!(slot = %lease.slot.id, "Checked-in actor is not running, replacing");
            PoolInner::schedule_replacement(&self.pool, lease);
        }
    }

    /// Throw the actor away and reopen the slot in the background.
    pub(crate) fn discard(mut self) {
        if let Some(lease) = self.lease.take() {
            PoolInner::schedule_replacement(&self.pool, lease);
        }
    }

    /// Put the slot back as it is, possibly without an actor.
    pub(crate) fn release_vacant(mut self) {
        if let Some(lease) = self.lease.take() {
            self.pool.restore(lease);
        }
    }

    /// Make sure the slot holds a running actor, opening one if needed.
    pub(crate) async fn ensure_open(&mut self, deadline: Instant) -> Result<()> {
        let Some(lease) = self.lease.as_mut() else {
            return Err(Error::PoolClosed);
        };
        if lease.slot.is_live() {
            return Ok(());
        }
        if let Some(mut stale) = lease.slot.actor.take() {
            tracing::debug!(slot = %lease.slot.id, actor_id = %stale.id(), "Idle actor died, reopening");
            self.pool.health.record_silent_death();
            stale.terminate().await;
        }
        let actor = self.pool.open_actor(deadline).await?;
        tracing::debug!(slot = %lease.slot.id, actor_id = %actor.id(), "Opened pooled actor");
        lease.slot.actor = Some(actor);
        Ok(())
    }
}

impl<T: Transport> fmt::Debug for PooledConnection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("slot", &self.slot_id())
            .field("actor", &self.actor().map(ActorHandle::id))
            .finish()
    }
}

impl<T: Transport> Drop for PooledConnection<T> {
    fn drop(&mut self) {
        if let Some(lease) = self.lease.take() {
            tracing::debug!(slot = %lease.slot.id, "Pooled connection dropped without checkin");
            PoolInner::schedule_replacement(&self.pool, lease);
        }
    }
}
