//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the request layer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Process-wide request defaults.
    pub request: RequestConfig,

    /// Connection pool settings.
    pub pool: PoolConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Defaults applied to every request that does not override them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Reply timeout in milliseconds.
    pub timeout_ms: u64,

    /// Extra margin on top of the timeout before the watchdog gives up.
    pub grace_ms: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            grace_ms: 100,
        }
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of persistent connection actors.
    pub capacity: usize,

    /// Destination every pooled connection is opened against.
    pub target_url: String,

    /// Open every slot at start-up instead of on first checkout.
    pub warm_up: bool,

    /// Pool monitor tick interval in milliseconds.
    pub monitor_interval_ms: u64,

    /// Base delay for reviving a dead slot.
    pub revive_base_delay_ms: u64,

    /// Upper bound on the revival delay.
    pub revive_max_delay_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            target_url: "http://127.0.0.1:8080".to_string(),
            warm_up: false,
            monitor_interval_ms: 1_000,
            revive_base_delay_ms: 100,
            revive_max_delay_ms: 5_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
