//! Process-wide request defaults.
//!
//! Requests that carry no `timeout` option fall back to the values installed
//! here. The defaults can be swapped at runtime (config reload) without
//! blocking in-flight requests.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::config::schema::RequestConfig;

/// Timeout settings shared by every request in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestDefaults {
    /// Reply timeout used when a request sets none.
    pub timeout: Duration,
    /// Margin added to the timeout by the outer watchdog.
    pub grace: Duration,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self::from(&RequestConfig::default())
    }
}

impl From<&RequestConfig> for RequestDefaults {
    fn from(config: &RequestConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            grace: Duration::from_millis(config.grace_ms),
        }
    }
}

static DEFAULTS: OnceLock<ArcSwap<RequestDefaults>> = OnceLock::new();

fn slot() -> &'static ArcSwap<RequestDefaults> {
    DEFAULTS.get_or_init(|| ArcSwap::from_pointee(RequestDefaults::default()))
}

/// Current process-wide defaults.
pub fn current() -> Arc<RequestDefaults> {
    slot().load_full()
}

/// Replace the process-wide defaults.
pub fn install(defaults: RequestDefaults) {
    tracing::debug!(
        timeout_ms = defaults.timeout.as_millis() as u64,
        grace_ms = defaults.grace.as_millis() as u64,
        "Installing request defaults"
    );
    slot().store(Arc::new(defaults));
}
