//! Background pool upkeep.
//!
//! # Responsibilities
//! - Periodically replace idle actors that stopped on their own
//! - Revive dead slots once their backoff has elapsed

use std::time::Duration;

use rand::Rng;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::pool::manager::ConnectionPool;
use crate::transport::Transport;

pub struct PoolMonitor<T: Transport> {
    pool: ConnectionPool<T>,
    interval: Duration,
}

impl<T: Transport> PoolMonitor<T> {
    pub fn new(pool: ConnectionPool<T>) -> Self {
        let interval = Duration::from_millis(pool.monitor_interval_ms().max(1));
        Self { pool, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            target = %self.pool.target(),
            "Pool monitor starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so a fresh pool is left alone.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Pool monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn tick(&self) {
        let inner = self.pool.inner();
        inner.sweep_idle().await;
        inner.revive_dead().await;

        let status = self.pool.status();
        if status.dead > 0 {
            tracing::debug!(
                dead = status.dead,
                effective_capacity = status.effective_capacity,
                "Pool running below capacity"
            );
        }
    }
}

/// Delay before the `attempt`-th revival of a dead slot.
///
/// Doubles from `base_ms` and is capped at `max_ms`; up to 10% is shaved off
/// at random so slots that died together do not retry in lockstep.
pub(crate) fn revival_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(32);
    let capped = base_ms.saturating_mul(1u64 << exponent).min(max_ms);

    let spread = capped / 10;
    let shave = if spread > 0 {
        rand::thread_rng().gen_range(0..=spread)
    } else {
        0
    };
    Duration::from_millis(capped - shave)
}
