//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! client, pool, transport produce:
//!     → logging.rs (structured tracing events: actor ids, slot ids, error kinds)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
