//! Client session: one configuration value bound to one store.
//!
//! # Data Flow
//! ```text
//! Client::save     → lock value → marshal (registers paths) → Store writes
//! Client::load     → lock value → unmarshal                 → Store reads
//! Client::register → lock value → resolver                  → PathRegistry
//! Client::watch    → selector → FieldKey → PathRegistry → pre-read index
//!                  → spawned watcher task → on_change()
//! ```
//!
//! # Design Decisions
//! - The value lives behind `Arc<tokio::sync::Mutex<T>>` so a watch task can
//!   write into it while the caller keeps using the client
//! - Save and Load hold the lock for the whole traversal, which serializes
//!   them against each other and against watch deliveries
//! - The registry belongs to the session; registered locations stay valid
//!   as long as the value is not moved out of the mutex

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::binding::field::{Bind, FieldKey, IntoField};
use crate::binding::resolver::{resolve, PathRegistry};
use crate::binding::watcher::{self, WatchHandle};
use crate::binding::{marshal, unmarshal};
use crate::config::EtcdBindConfig;
use crate::error::{Error, Result};
use crate::observability::metrics;
use crate::store::{EtcdClient, Store};

/// A configuration value of type `T` kept in sync with store `S`.
pub struct Client<S: ?Sized, T> {
    store: Arc<S>,
    config: Arc<Mutex<T>>,
    registry: PathRegistry,
    ttl: u64,
}

impl<T: Bind + 'static> Client<EtcdClient, T> {
    /// Connect to the etcd machines named in `settings`.
    pub fn connect(settings: &EtcdBindConfig, value: T) -> Result<Self> {
        let store = EtcdClient::new(&settings.store, &settings.retries).map_err(Error::Setup)?;
        Ok(Self::new(Arc::new(store), value).with_ttl(settings.store.default_ttl_secs))
    }
}

impl<S, T> Client<S, T>
where
    S: Store + ?Sized + 'static,
    T: Bind + 'static,
{
    pub fn new(store: Arc<S>, value: T) -> Self {
        Self::from_shared(store, Arc::new(Mutex::new(value)))
    }

    /// Bind an already shared value.
    pub fn from_shared(store: Arc<S>, config: Arc<Mutex<T>>) -> Self {
        Self {
            store,
            config,
            registry: PathRegistry::new(),
            ttl: 0,
        }
    }

    /// TTL in seconds for every node Save writes. 0 disables it.
    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Shared handle to the bound value.
    pub fn config(&self) -> Arc<Mutex<T>> {
        Arc::clone(&self.config)
    }

    pub fn registry(&self) -> &PathRegistry {
        &self.registry
    }

    /// Record every tagged field's path without touching the store.
    pub async fn register(&self) -> Result<usize> {
        let mut value = self.config.lock().await;
        let descriptors = resolve(&mut *value)?;
        let count = descriptors.len();
        self.registry.extend(descriptors);
        tracing::debug!(fields = count, "Configuration registered");
        Ok(count)
    }

    /// Write every tagged field to the store.
    pub async fn save(&self) -> Result<()> {
        let started = Instant::now();
        let mut value = self.config.lock().await;
        let result = marshal::save(&*self.store, &mut *value, &self.registry, self.ttl).await;
        drop(value);

        metrics::record_sync("save", started);
        match &result {
            Ok(()) => tracing::info!(
                fields = self.registry.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Configuration saved"
            ),
            Err(e) => tracing::warn!(error = %e, "Save failed"),
        }
        result
    }

    /// Read every tagged field from the store.
    pub async fn load(&self) -> Result<()> {
        let started = Instant::now();
        let mut value = self.config.lock().await;
        let result = unmarshal::load(&*self.store, &mut *value).await;
        drop(value);

        metrics::record_sync("load", started);
        match &result {
            Ok(()) => tracing::info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Configuration loaded"
            ),
            Err(e) => tracing::warn!(error = %e, "Load failed"),
        }
        result
    }

    /// Watch the field picked by `select` and run `on_change` once when the
    /// store reports a change to it.
    ///
    /// The field must have been saved or registered first. Only one change
    /// is delivered per call.
    pub async fn watch<V, F, C>(&self, select: F, on_change: C) -> Result<WatchHandle>
    where
        V: IntoField + 'static,
        F: Fn(&mut T) -> &mut V + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let key = {
            let mut value = self.config.lock().await;
            FieldKey::of(&*select(&mut *value))
        };
        let descriptor = self.registry.lookup(&key).ok_or(Error::Unregistered {
            type_name: std::any::type_name::<V>(),
        })?;

        let recursive = !descriptor.kind.is_scalar();
        let current = self
            .store
            .get(&descriptor.path, true, recursive)
            .await
            .map_err(|source| Error::store(&descriptor.path, source))?;
        let since_index = current.max_modified_index() + 1;

        Ok(watcher::spawn(
            Arc::clone(&self.store),
            Arc::clone(&self.config),
            descriptor,
            since_index,
            select,
            on_change,
        ))
    }
}
