//! Configuration validation.
//!
//! # Responsibilities
//! - Check store endpoints are absolute http(s) URLs
//! - Validate value ranges (timeouts > 0, retry bounds)
//! - Check the metrics address when metrics are enabled
//!
//! Returns every problem found, not just the first.

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::EtcdBindConfig;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &EtcdBindConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let store = &config.store;
    if store.machines.is_empty() {
        errors.push(ValidationError::new("store.machines", "at least one machine is required"));
    }
    for (i, machine) in store.machines.iter().enumerate() {
        let field = format!("store.machines[{}]", i);
        match Url::parse(machine) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            Ok(url) => errors.push(ValidationError::new(
                field,
                format!("unsupported endpoint {:?} (scheme {})", machine, url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new(field, format!("invalid URL {:?}: {}", machine, e))),
        }
    }
    if store.request_timeout_secs == 0 {
        errors.push(ValidationError::new("store.request_timeout_secs", "must be greater than 0"));
    }
    if store.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("store.connect_timeout_secs", "must be greater than 0"));
    }

    let retries = &config.retries;
    if retries.enabled {
        if retries.max_attempts == 0 {
            errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
        }
        if retries.base_delay_ms > retries.max_delay_ms {
            errors.push(ValidationError::new(
                "retries.base_delay_ms",
                format!("exceeds max_delay_ms ({})", retries.max_delay_ms),
            ));
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
