//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EtcdBindConfig {
    /// Store endpoints and request limits.
    pub store: StoreConfig,

    /// Retry policy for store requests.
    pub retries: RetryConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// etcd endpoints and per-request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URLs of the etcd machines, tried in order.
    pub machines: Vec<String>,

    /// Deadline for every non-watch request.
    pub request_timeout_secs: u64,

    /// TCP connect deadline.
    pub connect_timeout_secs: u64,

    /// TTL applied to every node Save writes. 0 means no TTL.
    pub default_ttl_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            machines: vec!["http://127.0.0.1:4001".to_string()],
            request_timeout_secs: 5,
            connect_timeout_secs: 2,
            default_ttl_secs: 0,
        }
    }
}

impl StoreConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retry rounds after every machine failed.
    pub enabled: bool,

    /// Total rounds, the first one included.
    pub max_attempts: u32,

    /// Delay before the second round.
    pub base_delay_ms: u64,

    /// Upper bound for any delay.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

impl RetryConfig {
    /// Rounds actually attempted.
    pub fn rounds(&self) -> u32 {
        if self.enabled {
            self.max_attempts.max(1)
        } else {
            1
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
