//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, capacity > 0)
//! - Check the pool target is an absolute http(s) URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::ClientConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("pool.target_url '{url}' is invalid: {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("pool.revive_base_delay_ms ({base}) exceeds pool.revive_max_delay_ms ({max})")]
    ReviveDelayOrder { base: u64, max: u64 },

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.request.timeout_ms == 0 {
        errors.push(ValidationError::NotPositive { field: "request.timeout_ms" });
    }
    if config.pool.capacity == 0 {
        errors.push(ValidationError::NotPositive { field: "pool.capacity" });
    }
    if config.pool.monitor_interval_ms == 0 {
        errors.push(ValidationError::NotPositive { field: "pool.monitor_interval_ms" });
    }
    if config.pool.revive_base_delay_ms > config.pool.revive_max_delay_ms {
        errors.push(ValidationError::ReviveDelayOrder {
            base: config.pool.revive_base_delay_ms,
            max: config.pool.revive_max_delay_ms,
        });
    }
    if let Err(reason) = check_target(&config.pool.target_url) {
        errors.push(ValidationError::InvalidTarget {
            url: config.pool.target_url.clone(),
            reason,
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_target(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("scheme '{}' is not http(s)", other)),
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(())
}
