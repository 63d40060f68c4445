//! Structured logging.
//!
//! # Responsibilities
//! - Install the global tracing subscriber for the binary
//! - Honour `RUST_LOG` first, then the configured level

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directive used when neither `RUST_LOG` nor the config set a level.
pub const DEFAULT_DIRECTIVE: &str = "etcd_bind=info";

/// Build the filter: `RUST_LOG` wins over `level`.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if level.trim().is_empty() {
            DEFAULT_DIRECTIVE.into()
        } else {
            format!("etcd_bind={}", level.trim()).into()
        }
    })
}

/// Install the fmt subscriber. Call once, at startup.
pub fn init(level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
