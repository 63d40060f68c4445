//! Metrics collection and exposition.
//!
//! # Metrics
//! - `etcd_bind_store_requests_total` (counter): store calls by operation, outcome
//! - `etcd_bind_sync_duration_seconds` (histogram): Save/Load latency by operation
//! - `etcd_bind_watch_events_total` (counter): finished watches by outcome
//!
//! Recording is a no-op until an exporter is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

pub const STORE_REQUESTS_TOTAL: &str = "etcd_bind_store_requests_total";
pub const SYNC_DURATION_SECONDS: &str = "etcd_bind_sync_duration_seconds";
pub const WATCH_EVENTS_TOTAL: &str = "etcd_bind_watch_events_total";

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// One HTTP round trip to the store.
pub fn record_store_request(operation: &'static str, success: bool) {
    let outcome = if success { "ok" } else { "error" };
    metrics::counter!(STORE_REQUESTS_TOTAL, "operation" => operation, "outcome" => outcome)
        .increment(1);
}

/// A finished Save or Load.
pub fn record_sync(operation: &'static str, started: Instant) {
    metrics::histogram!(SYNC_DURATION_SECONDS, "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}

/// A watch that delivered a change or was cancelled.
pub fn record_watch_event(outcome: &'static str) {
    metrics::counter!(WATCH_EVENTS_TOTAL, "outcome" => outcome).increment(1);
}
