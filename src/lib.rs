//! Bind typed, nested configuration values to a hierarchical key-value store.
//!
//! A configuration structure lists its tagged fields through [`Bind`] (usually
//! with the [`bind!`] macro). A [`Client`] then keeps one such value in sync
//! with a [`Store`]:
//!
//! - `save` writes every tagged field under its path
//! - `load` reads them back, parsing each leaf into the field's type
//! - `watch` waits for one change to one field and applies it
//!
//! ```text
//! struct Service { name: String, limits: Limits, tags: Vec<String> }
//!
//!   /name            leaf "api"
//!   /limits/         directory
//!   /limits/max      leaf "10"
//!   /tags/           directory
//!   /tags/0          leaf "a"   (in-order children)
//! ```

pub mod binding;
pub mod client;
pub mod config;
pub mod error;
pub mod observability;
pub mod resilience;
pub mod store;

pub use binding::{
    resolve, Bind, Field, FieldDescriptor, FieldKey, FieldKind, FieldMut, IntoField, PathRegistry,
    ScalarKind, WatchHandle, WatchOutcome,
};
pub use client::Client;
pub use config::EtcdBindConfig;
pub use error::{Error, Result};
pub use store::{EtcdClient, MemoryStore, Node, Store, StoreError};
