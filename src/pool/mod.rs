//! Pooled request execution.
//!
//! # Data Flow
//! ```text
//! pool_request(pool, method, url, headers, body, options)
//!     → manager.rs: wait for a permit (FIFO), take an idle slot
//!     → slot.rs: open the slot's actor if it has none
//!     → client::exchange: same deadline race as one-shot requests
//!     → checkin on success or HTTP error status
//!     → discard on timeout / transport error (replaced in background)
//! ```
//!
//! # Design Decisions
//! - A slot is never idle while its actor is suspect
//! - Replacement failures degrade capacity instead of failing callers
//! - monitor.rs revives dead slots with jittered exponential backoff

pub mod health;
pub mod manager;
pub mod monitor;
pub mod slot;

pub use health::{HealthSnapshot, PoolStatus};
pub use manager::{pool_request, ConnectionPool};
pub use monitor::PoolMonitor;
pub use slot::{PooledConnection, SlotId, SlotState};
