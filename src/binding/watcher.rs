//! Single-field watch subscriptions.
//!
//! A watch is one spawned task. It parks on a blocking store watch until
//! either the store reports a change or the handle's token is cancelled.
//! On a change it writes the new value into the bound field, runs the
//! callback once and finishes. Callers that want continuous updates call
//! watch again.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::binding::field::{FieldMut, IntoField};
use crate::binding::resolver::FieldDescriptor;
use crate::binding::unmarshal;
use crate::error::{Error, Result};
use crate::observability::metrics;
use crate::store::{Node, Store};

/// How a watch task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// A change was applied to the field and the callback ran.
    Changed,
    /// The handle was cancelled first; the callback did not run.
    Cancelled,
}

/// Handle to a running watch.
///
/// Dropping the handle does not stop the watch; call [`WatchHandle::cancel`].
#[derive(Debug)]
pub struct WatchHandle {
    path: String,
    token: CancellationToken,
    task: JoinHandle<Result<WatchOutcome>>,
}

impl WatchHandle {
    /// Absolute store path being watched.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Stop the watch. Has no effect once a change was delivered.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the watch to end.
    pub async fn wait(self) -> Result<WatchOutcome> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(Error::WatchTask(e.to_string())),
        }
    }
}

pub(crate) fn spawn<S, T, V, F, C>(
    store: Arc<S>,
    config: Arc<Mutex<T>>,
    descriptor: FieldDescriptor,
    since_index: u64,
    select: F,
    on_change: C,
) -> WatchHandle
where
    S: Store + ?Sized + 'static,
    T: Send + 'static,
    V: IntoField + 'static,
    F: Fn(&mut T) -> &mut V + Send + 'static,
    C: FnOnce() + Send + 'static,
{
    let token = CancellationToken::new();
    let path = descriptor.path.clone();
    let cancelled = token.clone();

    let task = tokio::spawn(async move {
        let recursive = !descriptor.kind.is_scalar();
        tracing::info!(
            path = %descriptor.path,
            kind = %descriptor.kind,
            since_index,
            "Watch started"
        );

        let node = tokio::select! {
            biased;
            _ = cancelled.cancelled() => {
                tracing::info!(path = %descriptor.path, "Watch cancelled");
                metrics::record_watch_event("cancelled");
                return Ok(WatchOutcome::Cancelled);
            }
            result = store.watch(&descriptor.path, Some(since_index), recursive) => {
                result.map_err(|source| Error::store(&descriptor.path, source))?
            }
        };

        tracing::debug!(
            path = %descriptor.path,
            changed = %node.key,
            index = node.modified_index,
            "Change observed"
        );

        {
            let mut guard = config.lock().await;
            let field = select(&mut *guard);
            apply(&*store, &descriptor.path, field.as_field(), &node).await?;
        }

        on_change();
        metrics::record_watch_event("changed");
        tracing::info!(path = %descriptor.path, "Watch delivered change");
        Ok(WatchOutcome::Changed)
    });

    WatchHandle { path, token, task }
}

/// Write the observed change into the field.
///
/// A scalar takes the notified leaf value directly. Anything else is
/// reloaded from the store, since the notification only names one child.
async fn apply<S>(store: &S, path: &str, field: FieldMut<'_>, node: &Node) -> Result<()>
where
    S: Store + ?Sized,
{
    match field {
        FieldMut::Scalar(mut scalar) if !node.dir && node.key == path => scalar
            .assign(&node.value)
            .map_err(|reason| Error::type_mismatch(path, reason)),
        field => unmarshal::load_field(store, path, field).await,
    }
}
