//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! binding (save / load / watch) and store clients produce:
//!     → tracing events (debug per store call, info per sync)
//!     → metrics.rs (store request counters, sync latency, watch events)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, filtered by RUST_LOG or config)
//!     → Metrics endpoint (Prometheus scrape), when enabled
//! ```
//!
//! # Design Decisions
//! - The library only emits; installing subscribers and exporters is left
//!   to the binary
//! - Metric labels are bounded sets (operation, outcome), never store paths

pub mod logging;
pub mod metrics;
