//! Metrics collection and exposition.
//!
//! # Metrics
//! - `courier_requests_total` (counter): requests by mode and outcome
//! - `courier_request_duration_seconds` (histogram): latency by mode
//! - `courier_pool_checkout_wait_seconds` (histogram): time blocked in checkout
//! - `courier_pool_replacements_total` (counter): actor replacements by result
//! - `courier_pool_effective_capacity` (gauge): usable slots per pool target
//! - `courier_live_actors` (gauge): running connection actors
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is opt-in (binary only)

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished request. `mode` is "oneshot" or "pooled".
pub fn record_request(mode: &'static str, outcome: &'static str, start: Instant) {
    counter!("courier_requests_total", "mode" => mode, "outcome" => outcome).increment(1);
    histogram!("courier_request_duration_seconds", "mode" => mode)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_checkout_wait(start: Instant) {
    histogram!("courier_pool_checkout_wait_seconds").record(start.elapsed().as_secs_f64());
}

/// `result` is "replaced", "failed" or "revived".
pub fn record_replacement(result: &'static str) {
    counter!("courier_pool_replacements_total", "result" => result).increment(1);
}

pub fn record_effective_capacity(target: &str, slots: usize) {
    gauge!("courier_pool_effective_capacity", "target" => target.to_string()).set(slots as f64);
}

pub fn record_actor_started() {
    gauge!("courier_live_actors").increment(1.0);
}

pub fn record_actor_stopped() {
    gauge!("courier_live_actors").decrement(1.0);
}
