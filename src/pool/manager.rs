//! Connection pool management.
//!
//! # Responsibilities
//! - Hold a fixed number of slots against one destination
//! - Hand out slots first-come-first-served, blocking when none is idle
//! - Replace suspect actors before their slot becomes idle again
//! - Track dead slots so the monitor can revive them
//!
//! # Invariants
//! - available permits <= idle slots; a slot is pushed to the idle queue
//!   before its permit is released
//! - one forgotten permit per dead slot, so capacity never exceeds the
//!   configured size

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant as StdInstant;

use arc_swap::ArcSwapOption;
use bytes::Bytes;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use url::Url;

use crate::client::{exchange, outcome_label};
use crate::config::{defaults, PoolConfig, RequestDefaults};
use crate::error::{ConnectError, Error, Result, SendError};
use crate::http::{Method, Request, RequestOptions, Response};
use crate::observability::metrics;
use crate::pool::health::{HealthSnapshot, PoolHealth, PoolStatus};
use crate::pool::monitor::{revival_delay, PoolMonitor};
use crate::pool::slot::{Lease, PooledConnection, Slot, SlotId, SlotState};
use crate::transport::{ActorHandle, HyperTransport, Transport};

/// Revival schedule of a dead slot.
#[derive(Debug)]
struct Revival {
    attempts: u32,
    next_attempt: Instant,
}

#[derive(Debug)]
struct SlotTable {
    idle: VecDeque<Slot>,
    states: Vec<SlotState>,
    dead: HashMap<SlotId, Revival>,
}

pub(crate) struct PoolInner<T: Transport> {
    transport: T,
    target: Url,
    config: PoolConfig,
    defaults: ArcSwapOption<RequestDefaults>,
    permits: Arc<Semaphore>,
    table: Mutex<SlotTable>,
    pub(crate) health: PoolHealth,
}

impl<T: Transport> PoolInner<T> {
    fn table(&self) -> MutexGuard<'_, SlotTable> {
        self.table.lock().expect("pool slot table mutex poisoned")
    }

    fn defaults(&self) -> RequestDefaults {
        match self.defaults.load_full() {
            Some(pinned) => *pinned,
            None => *defaults::current(),
        }
    }

    fn target_label(&self) -> String {
        self.target.origin().ascii_serialization()
    }

    /// Open a fresh actor against the pool target, giving up at `deadline`.
    pub(crate) async fn open_actor(&self, deadline: Instant) -> Result<ActorHandle> {
        let budget = deadline.saturating_duration_since(Instant::now());
        match timeout_at(deadline, self.transport.open(self.target.as_str())).await {
            Ok(Ok(actor)) => Ok(actor),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ConnectError::TimedOut(budget.as_millis() as u64).into()),
        }
    }

    /// Deadline for opens nobody is waiting on (replacement, revival, warm-up).
    pub(crate) fn background_deadline(&self) -> Instant {
        Instant::now() + self.defaults().timeout
    }

    fn take_idle(&self, state: SlotState) -> Option<Slot> {
        let mut table = self.table();
        let slot = table.idle.pop_front()?;
        table.states[slot.id.0] = state;
        Some(slot)
    }

    fn set_state(&self, id: SlotId, state: SlotState) {
        self.table().states[id.0] = state;
    }

    /// Push the slot back to the idle queue, then release its permit.
    pub(crate) fn restore(&self, lease: Lease) {
        let Lease { mut slot, permit } = lease;
        {
            let mut table = self.table();
            if self.permits.is_closed() {
                table.states[slot.id.0] = SlotState::Closed;
                // Dropping the handle aborts the actor.
                slot.actor.take();
            } else {
                table.states[slot.id.0] = SlotState::Idle;
                table.idle.push_back(slot);
            }
        }
        drop(permit);
    }

    fn effective_capacity(&self) -> usize {
        self.config.capacity - self.table().dead.len()
    }

    fn mark_dead(&self, id: SlotId) {
        let effective = {
            let mut table = self.table();
            table.states[id.0] = SlotState::Dead;
            table.dead.insert(
                id,
                Revival {
                    attempts: 1,
                    next_attempt: Instant::now()
                        + revival_delay(1, self.config.revive_base_delay_ms, self.config.revive_max_delay_ms),
                },
            );
            self.config.capacity - table.dead.len()
        };
        metrics::record_effective_capacity(&self.target_label(), effective);
    }

    /// Replace the lease's actor in the background.
    pub(crate) fn schedule_replacement(pool: &Arc<Self>, lease: Lease) {
        pool.set_state(lease.slot.id, SlotState::Replacing);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(Arc::clone(pool).replace(lease));
            }
            Err(_) => {
                tracing::warn!(slot = %lease.slot.id, "No runtime to replace actor, marking slot dead");
                let Lease { slot, permit } = lease;
                pool.health.record_replacement_failure();
                pool.mark_dead(slot.id);
                permit.forget();
            }
        }
    }

    /// Terminate the old actor and open a new one for the same slot.
    ///
    /// On failure the slot goes dead and its permit is forgotten, shrinking
    /// effective capacity by one until the monitor revives it.
    pub(crate) async fn replace(self: Arc<Self>, lease: Lease) {
        let Lease { mut slot, permit } = lease;
        self.set_state(slot.id, SlotState::Replacing);

        if let Some(mut old) = slot.actor.take() {
            tracing::debug!(slot = %slot.id, actor_id = %old.id(), "Terminating suspect actor");
            old.terminate().await;
        }
        if self.permits.is_closed() {
            self.restore(Lease { slot, permit });
            return;
        }

        match self.open_actor(self.background_deadline()).await {
            Ok(actor) => {
                tracing::info!(slot = %slot.id, actor_id = %actor.id(), "Replaced pooled actor");
                self.health.record_replacement();
                metrics::record_replacement("replaced");
                slot.actor = Some(actor);
                self.restore(Lease { slot, permit });
            }
            Err(e) => {
                tracing::warn!(
                    slot = %slot.id,
                    target = %self.target_label(),
                    error = %e,
                    "Actor replacement failed, pool capacity degraded"
                );
                self.health.record_replacement_failure();
                metrics::record_replacement("failed");
                self.mark_dead(slot.id);
                permit.forget();
            }
        }
    }

    /// Replace idle actors that stopped while nobody was using them.
    pub(crate) async fn sweep_idle(self: &Arc<Self>) {
        let idle = self.table().idle.len();
        for _ in 0..idle {
            let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
                break;
            };
            let Some(slot) = self.take_idle(SlotState::Replacing) else {
                break;
            };
            let lease = Lease { slot, permit };
            if lease.slot.actor.as_ref().is_some_and(|actor| !actor.is_alive()) {
                tracing::info!(slot = %lease.slot.id, "Idle actor died silently");
                self.health.record_silent_death();
                Arc::clone(self).replace(lease).await;
            } else {
                self.restore(lease);
            }
        }
    }

    /// Try to reopen dead slots whose backoff has elapsed.
    pub(crate) async fn revive_dead(&self) {
        let now = Instant::now();
        let due: Vec<SlotId> = self
            .table()
            .dead
            .iter()
            .filter(|(_, revival)| revival.next_attempt <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in due {
            if self.permits.is_closed() {
                return;
            }
            match self.open_actor(self.background_deadline()).await {
                Ok(actor) => {
                    // `close` marks the semaphore closed before draining under
                    // this lock, so checking here cannot miss a concurrent close.
                    let revived = {
                        let mut table = self.table();
                        table.dead.remove(&id);
                        if self.permits.is_closed() {
                            table.states[id.0] = SlotState::Closed;
                            Err(actor)
                        } else {
                            table.states[id.0] = SlotState::Idle;
                            table.idle.push_back(Slot {
                                id,
                                actor: Some(actor),
                            });
                            Ok(self.config.capacity - table.dead.len())
                        }
                    };
                    let effective = match revived {
                        Ok(effective) => effective,
                        Err(mut actor) => {
                            tracing::debug!(slot = %id, "Pool closed while reviving slot, stopping actor");
                            actor.terminate().await;
                            return;
                        }
                    };
                    self.permits.add_permits(1);
                    self.health.record_revival();
                    metrics::record_replacement("revived");
                    metrics::record_effective_capacity(&self.target_label(), effective);
                    tracing::info!(slot = %id, effective_capacity = effective, "Revived dead slot");
                }
                Err(e) => {
                    let mut table = self.table();
                    if let Some(revival) = table.dead.get_mut(&id) {
                        revival.attempts += 1;
                        revival.next_attempt = Instant::now()
                            + revival_delay(
                                revival.attempts,
                                self.config.revive_base_delay_ms,
                                self.config.revive_max_delay_ms,
                            );
                        tracing::debug!(slot = %id, attempts = revival.attempts, error = %e, "Slot revival failed");
                    }
                }
            }
        }
    }

    fn status(&self) -> PoolStatus {
        let table = self.table();
        let count = |wanted: SlotState| table.states.iter().filter(|s| **s == wanted).count();
        PoolStatus {
            capacity: self.config.capacity,
            effective_capacity: self.config.capacity - table.dead.len(),
            idle: count(SlotState::Idle),
            in_use: count(SlotState::InUse),
            replacing: count(SlotState::Replacing),
            dead: count(SlotState::Dead),
            closed: count(SlotState::Closed),
        }
    }
}

/// A fixed-size set of persistent connection actors against one destination.
///
/// Cloning is cheap; clones share the same slots.
pub struct ConnectionPool<T: Transport = HyperTransport> {
    inner: Arc<PoolInner<T>>,
}

impl<T: Transport> Clone for ConnectionPool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> std::fmt::Debug for ConnectionPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("target", &self.inner.target.as_str())
            .field("status", &self.inner.status())
            .finish()
    }
}

impl ConnectionPool<HyperTransport> {
    /// Pool over the bundled hyper engine.
    pub fn new(config: PoolConfig) -> Result<Self> {
        Self::with_transport(config, HyperTransport::new())
    }
}

impl<T: Transport> ConnectionPool<T> {
    pub fn with_transport(config: PoolConfig, transport: T) -> Result<Self> {
        if config.capacity == 0 {
            return Err(Error::Config("pool capacity must be greater than zero".to_string()));
        }
        let target = Url::parse(&config.target_url).map_err(|e| {
            Error::Config(format!("invalid pool target '{}': {}", config.target_url, e))
        })?;
        if target.host_str().is_none() {
            return Err(Error::Config(format!(
                "pool target '{}' has no host",
                config.target_url
            )));
        }

        let capacity = config.capacity;
        let table = SlotTable {
            idle: (0..capacity).map(|i| Slot::vacant(SlotId(i))).collect(),
            states: vec![SlotState::Idle; capacity],
            dead: HashMap::new(),
        };
        let inner = PoolInner {
            transport,
            target,
            config,
            defaults: ArcSwapOption::empty(),
            permits: Arc::new(Semaphore::new(capacity)),
            table: Mutex::new(table),
            health: PoolHealth::default(),
        };
        metrics::record_effective_capacity(&inner.target_label(), capacity);
        tracing::info!(target = %inner.target, capacity, "Connection pool created");

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Pin request defaults for this pool instead of the process-wide ones.
    pub fn set_defaults(&self, defaults: RequestDefaults) {
        self.inner.defaults.store(Some(Arc::new(defaults)));
    }

    pub fn target(&self) -> &Url {
        &self.inner.target
    }

    pub fn capacity(&self) -> usize {
        self.inner.config.capacity
    }

    pub fn effective_capacity(&self) -> usize {
        self.inner.effective_capacity()
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    pub fn status(&self) -> PoolStatus {
        self.inner.status()
    }

    pub fn health(&self) -> HealthSnapshot {
        self.inner.health.snapshot()
    }

    /// Borrow an actor, waiting (first-come-first-served) until one is idle.
    ///
    /// There is no timeout on the wait; callers that need one wrap the call.
    /// A slot without a running actor is opened within the pool's default
    /// request timeout.
    pub async fn checkout(&self) -> Result<PooledConnection<T>> {
        let conn = self.acquire().await?;
        self.open_borrowed(conn, self.inner.background_deadline()).await
    }

    /// Wait for a permit and take the idle slot it stands for.
    async fn acquire(&self) -> Result<PooledConnection<T>> {
        let start = StdInstant::now();
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| Error::PoolClosed)?;
        metrics::record_checkout_wait(start);

        let Some(slot) = self.inner.take_idle(SlotState::InUse) else {
            return Err(Error::PoolClosed);
        };
        Ok(PooledConnection::new(Lease { slot, permit }, Arc::clone(&self.inner)))
    }

    async fn open_borrowed(&self, mut conn: PooledConnection<T>, deadline: Instant) -> Result<PooledConnection<T>> {
        if let Err(e) = conn.ensure_open(deadline).await {
            tracing::warn!(target = %self.inner.target, error = %e, "Failed to open pooled actor");
            conn.release_vacant();
            return Err(e);
        }
        Ok(conn)
    }

    /// Return a healthy actor to the pool.
    pub fn checkin(&self, conn: PooledConnection<T>) {
        conn.checkin();
    }

    /// Return an actor whose state is unknown; it is replaced before reuse.
    pub fn discard(&self, conn: PooledConnection<T>) {
        conn.discard();
    }

    /// Execute a request on a borrowed actor.
    pub async fn request(&self, request: Request) -> Result<Response> {
        let start = StdInstant::now();
        let outcome = self.execute(&request).await;
        metrics::record_request("pooled", outcome_label(&outcome), start);
        outcome
    }

    async fn execute(&self, request: &Request) -> Result<Response> {
        let timing = request.request_options().resolve(&self.inner.defaults())?;
        self.check_origin(request.url())?;

        // The request clock starts once a slot is ours; the wait for it is unbounded.
        let conn = self.acquire().await?;
        let deadline = timing.deadline();
        let conn = self.open_borrowed(conn, deadline).await?;
        let slot = conn.slot_id();
        let outcome = match conn.actor() {
            Some(actor) => {
                tracing::debug!(
                    slot = ?slot,
                    actor_id = %actor.id(),
                    method = %request.method(),
                    url = %request.url(),
                    "Dispatching pooled request"
                );
                exchange::run(actor, request, deadline, timing.grace).await
            }
            None => Err(SendError::ActorStopped.into()),
        };
        match &outcome {
            Err(e) if e.taints_connection() => {
                tracing::warn!(slot = ?slot, kind = e.kind(), error = %e, "Discarding pooled actor");
                conn.discard();
            }
            _ => conn.checkin(),
        }
        outcome
    }

    fn check_origin(&self, raw: &str) -> Result<()> {
        let url = Url::parse(raw)
            .map_err(|e| Error::InvalidRequest(format!("invalid URL '{}': {}", raw, e)))?;
        let target = &self.inner.target;
        let same_origin = url.scheme() == target.scheme()
            && url.host_str() == target.host_str()
            && url.port_or_known_default() == target.port_or_known_default();
        if same_origin {
            Ok(())
        } else {
            Err(Error::InvalidRequest(format!(
                "'{}' is not served by the pool for {}",
                raw,
                self.inner.target_label()
            )))
        }
    }

    /// Open every vacant idle slot now. Returns how many actors were opened.
    pub async fn warm_up(&self) -> usize {
        let mut opened = 0;
        for _ in 0..self.inner.config.capacity {
            let Ok(permit) = Arc::clone(&self.inner.permits).try_acquire_owned() else {
                break;
            };
            let Some(slot) = self.inner.take_idle(SlotState::Replacing) else {
                break;
            };
            let was_live = slot.is_live();
            let mut conn = PooledConnection::new(Lease { slot, permit }, Arc::clone(&self.inner));
            match conn.ensure_open(self.inner.background_deadline()).await {
                Ok(()) if !was_live => opened += 1,
                Ok(()) => {}
                Err(e) => tracing::warn!(target = %self.inner.target, error = %e, "Warm-up open failed"),
            }
            conn.release_vacant();
        }
        tracing::info!(opened, "Pool warm-up finished");
        opened
    }

    /// Run the health monitor until `shutdown` fires.
    pub fn spawn_monitor(&self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let monitor = PoolMonitor::new(self.clone());
        tokio::spawn(monitor.run(shutdown))
    }

    pub(crate) fn inner(&self) -> &Arc<PoolInner<T>> {
        &self.inner
    }

    pub(crate) fn monitor_interval_ms(&self) -> u64 {
        self.inner.config.monitor_interval_ms
    }

    /// Close the pool: pending and future checkouts fail, idle actors stop.
    /// Borrowed actors are stopped when they come back.
    pub async fn close(&self) {
        self.inner.permits.close();
        let drained: Vec<Slot> = {
            let mut table = self.inner.table();
            let drained: Vec<Slot> = table.idle.drain(..).collect();
            for slot in &drained {
                table.states[slot.id.0] = SlotState::Closed;
            }
            drained
        };
        let mut stopped = 0;
        for mut slot in drained {
            if let Some(mut actor) = slot.actor.take() {
                actor.terminate().await;
                stopped += 1;
            }
        }
        tracing::info!(target = %self.inner.target, stopped, "Connection pool closed");
    }
}

/// Pooled request through `pool`.
pub async fn pool_request<T, I, K, V>(
    pool: &ConnectionPool<T>,
    method: Method,
    url: impl Into<String>,
    headers: I,
    body: impl Into<Bytes>,
    options: RequestOptions,
) -> Result<Response>
where
    T: Transport,
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let request = Request::new(method, url)
        .headers(headers)
        .body(body)
        .options(options);
    pool.request(request).await
}
