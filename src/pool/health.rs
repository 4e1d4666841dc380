//! Pool health accounting.
//!
//! Replacement failures are never raised to borrowers; they land here, in the
//! logs and in metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters updated by the pool and its monitor.
#[derive(Debug, Default)]
pub struct PoolHealth {
    replacements: AtomicU64,
    replacement_failures: AtomicU64,
    revivals: AtomicU64,
    silent_deaths: AtomicU64,
}

impl PoolHealth {
    pub(crate) fn record_replacement(&self) {
        self.replacements.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_replacement_failure(&self) {
        self.replacement_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_revival(&self) {
        self.revivals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_silent_death(&self) {
        self.silent_deaths.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            replacements: self.replacements.load(Ordering::Relaxed),
            replacement_failures: self.replacement_failures.load(Ordering::Relaxed),
            revivals: self.revivals.load(Ordering::Relaxed),
            silent_deaths: self.silent_deaths.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the health counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    /// Suspect actors successfully swapped for fresh ones.
    pub replacements: u64,
    /// Replacements that could not open a new actor (slot went dead).
    pub replacement_failures: u64,
    /// Dead slots brought back by the monitor.
    pub revivals: u64,
    /// Idle actors found stopped at checkout or by the monitor.
    pub silent_deaths: u64,
}

/// Slot counts by state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub capacity: usize,
    /// Capacity minus dead slots.
    pub effective_capacity: usize,
    pub idle: usize,
    pub in_use: usize,
    pub replacing: usize,
    pub dead: usize,
    /// Slots retired by `close`.
    pub closed: usize,
}
