//! Hierarchical key-value store abstraction.
//!
//! # Data Flow
//! ```text
//! binding (marshal / unmarshal / watcher)
//!     → Store trait (create_dir, create_in_order, set, get, watch)
//!     → memory.rs (in-process tree, used by tests and demos)
//!     → etcd.rs   (etcd v2 HTTP API with failover and retries)
//! ```
//!
//! # Design Decisions
//! - One trait call per store operation; atomicity is per call only
//! - Errors carry the etcd v2 error code so callers can tell
//!   "already exists" and "key not found" apart from real failures
//! - `watch` blocks until a change arrives; dropping the future cancels it

pub mod error;
pub mod etcd;
pub mod memory;
pub mod node;

use async_trait::async_trait;

pub use error::{StoreError, StoreResult};
pub use etcd::EtcdClient;
pub use memory::MemoryStore;
pub use node::Node;

/// Directory and leaf primitives consumed by the binding engine.
///
/// Paths are absolute and `/`-separated. A `ttl` of zero means the node never
/// expires.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create a directory. Fails with [`StoreError::NodeExists`] when the path
    /// is already taken.
    async fn create_dir(&self, path: &str, ttl: u64) -> StoreResult<Node>;

    /// Append a leaf under the directory at `path`. The store picks the
    /// position suffix, which sorts numerically in append order.
    async fn create_in_order(&self, path: &str, value: &str, ttl: u64) -> StoreResult<Node>;

    /// Write or overwrite a leaf. Fails with [`StoreError::NotFile`] when the
    /// path names a directory.
    async fn set(&self, path: &str, value: &str, ttl: u64) -> StoreResult<Node>;

    /// Read a leaf or a directory. With `recursive` the whole subtree is
    /// returned, otherwise only the direct children of a directory.
    async fn get(&self, path: &str, sorted: bool, recursive: bool) -> StoreResult<Node>;

    /// Block until the node at `path` (or, with `recursive`, anything below
    /// it) changes at or after `since_index`, then return the changed node.
    async fn watch(&self, path: &str, since_index: Option<u64>, recursive: bool) -> StoreResult<Node>;
}

#[async_trait]
impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    async fn create_dir(&self, path: &str, ttl: u64) -> StoreResult<Node> {
        (**self).create_dir(path, ttl).await
    }

    async fn create_in_order(&self, path: &str, value: &str, ttl: u64) -> StoreResult<Node> {
        (**self).create_in_order(path, value, ttl).await
    }

    async fn set(&self, path: &str, value: &str, ttl: u64) -> StoreResult<Node> {
        (**self).set(path, value, ttl).await
    }

    async fn get(&self, path: &str, sorted: bool, recursive: bool) -> StoreResult<Node> {
        (**self).get(path, sorted, recursive).await
    }

    async fn watch(&self, path: &str, since_index: Option<u64>, recursive: bool) -> StoreResult<Node> {
        (**self).watch(path, since_index, recursive).await
    }
}
