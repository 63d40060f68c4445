//! Resilience helpers for the store transport.
//!
//! # Data Flow
//! ```text
//! EtcdClient request:
//!     → each machine in order (failover on transport errors)
//!     → all machines failed: backoff.rs delay, next round
//!     → rounds exhausted: last transport error is returned
//! ```
//!
//! # Design Decisions
//! - Only transport failures are retried; etcd error bodies are answers
//! - Ordered appends are not idempotent: they fail over only when the
//!   connection was refused and are never retried in a later round
//! - Watches get no request timeout; they block until a change or cancel

pub mod backoff;

pub use backoff::calculate_backoff;
