//! etcd v2 keys API client.
//!
//! # Responsibilities
//! - Map each [`Store`] call onto one `/v2/keys` HTTP request
//! - Fail over across machines in order when a machine cannot be reached
//! - Retry whole rounds with exponential backoff
//! - Send ordered appends at most once: they only fail over when the
//!   connection was refused, and never retry a round
//! - Report the watched node's removal as [`StoreError::KeyNotFound`]
//! - Decode etcd error bodies into [`StoreError`] codes

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::config::{RetryConfig, StoreConfig};
use crate::observability::metrics;
use crate::resilience::calculate_backoff;
use crate::store::{Node, Store, StoreError, StoreResult};

/// Successful keys API response.
#[derive(Debug, Deserialize)]
struct KeysResponse {
    #[serde(default)]
    action: String,
    node: Node,
}

impl KeysResponse {
    /// True when the event took `path` (or one of its ancestors) away.
    fn removes(&self, path: &str) -> bool {
        let removal = matches!(self.action.as_str(), "delete" | "expire" | "compareAndDelete");
        let removed = self.node.key.trim_end_matches('/');
        let path = path.trim_end_matches('/');
        removal
            && (path == removed
                || path
                    .strip_prefix(removed)
                    .is_some_and(|rest| rest.starts_with('/')))
    }
}

/// A request that did not produce a response.
struct SendFailure {
    error: StoreError,
    /// The connection was never established, so the server saw nothing.
    unsent: bool,
}

/// etcd error body, e.g. `{"errorCode":100,"message":"Key not found","cause":"/a"}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "errorCode")]
    error_code: u32,
    #[serde(default)]
    message: String,
    #[serde(default)]
    cause: String,
}

struct Request<'a> {
    operation: &'static str,
    method: Method,
    path: &'a str,
    query: Vec<(&'static str, String)>,
    form: Vec<(&'static str, String)>,
    /// `None` blocks without a deadline (watches).
    timeout: Option<Duration>,
    /// Safe to send again after a timeout or a dropped response.
    idempotent: bool,
}

impl<'a> Request<'a> {
    fn new(operation: &'static str, method: Method, path: &'a str, timeout: Duration) -> Self {
        Self {
            operation,
            method,
            path,
            query: Vec::new(),
            form: Vec::new(),
            timeout: Some(timeout),
            idempotent: true,
        }
    }

    fn ttl(mut self, ttl: u64) -> Self {
        if ttl > 0 {
            self.form.push(("ttl", ttl.to_string()));
        }
        self
    }
}

/// HTTP client for a set of etcd machines.
#[derive(Debug, Clone)]
pub struct EtcdClient {
    http: reqwest::Client,
    machines: Vec<Url>,
    request_timeout: Duration,
    retries: RetryConfig,
}

impl EtcdClient {
    /// Build a client. Machines are tried in the order given.
    pub fn new(store: &StoreConfig, retries: &RetryConfig) -> StoreResult<Self> {
        let mut machines = Vec::with_capacity(store.machines.len());
        for machine in &store.machines {
            let url = Url::parse(machine)
                .map_err(|e| StoreError::Transport(format!("invalid machine URL '{}': {}", machine, e)))?;
            if url.cannot_be_a_base() {
                return Err(StoreError::Transport(format!("machine URL '{}' has no path", machine)));
            }
            machines.push(url);
        }
        if machines.is_empty() {
            return Err(StoreError::Transport("no etcd machines configured".to_string()));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(store.connect_timeout())
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        tracing::info!(
            machines = ?store.machines,
            request_timeout_secs = store.request_timeout_secs,
            "etcd client initialized"
        );

        Ok(Self {
            http,
            machines,
            request_timeout: store.request_timeout(),
            retries: retries.clone(),
        })
    }

    pub fn machines(&self) -> &[Url] {
        &self.machines
    }

    async fn execute(&self, request: Request<'_>) -> StoreResult<KeysResponse> {
        let result = self.execute_rounds(&request).await;
        metrics::record_store_request(request.operation, result.is_ok());
        result
    }

    async fn execute_rounds(&self, request: &Request<'_>) -> StoreResult<KeysResponse> {
        let mut last_error = None;
        let rounds = if request.idempotent { self.retries.rounds() } else { 1 };

        for round in 0..rounds {
            if round > 0 {
                let delay = calculate_backoff(round, &self.retries);
                tracing::warn!(
                    operation = request.operation,
                    path = request.path,
                    round,
                    delay_ms = delay.as_millis() as u64,
                    "All machines failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }

            for (i, machine) in self.machines.iter().enumerate() {
                match self.send(machine, request).await {
                    Ok((status, body)) => return decode(status, &body),
                    Err(failure) if !request.idempotent && !failure.unsent => {
                        tracing::warn!(
                            machine_idx = i,
                            operation = request.operation,
                            error = %failure.error,
                            "Request may have been applied, not resending"
                        );
                        return Err(failure.error);
                    }
                    Err(failure) => {
                        tracing::warn!(
                            machine_idx = i,
                            operation = request.operation,
                            error = %failure.error,
                            "etcd request failed, trying next machine"
                        );
                        last_error = Some(failure.error);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| StoreError::Transport("no etcd machines configured".to_string())))
    }

    async fn send(&self, machine: &Url, request: &Request<'_>) -> Result<(StatusCode, Vec<u8>), SendFailure> {
        let url = key_url(machine, request.path).map_err(|error| SendFailure { error, unsent: true })?;
        tracing::debug!(method = %request.method, url = %url, "etcd request");

        let mut builder = self.http.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if !request.form.is_empty() {
            builder = builder.form(&request.form);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let transport = |e: reqwest::Error| SendFailure {
            unsent: e.is_connect(),
            error: StoreError::Transport(format!("{}: {}", machine, e)),
        };
        let response = builder.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;
        Ok((status, body.to_vec()))
    }
}

/// `<machine>/v2/keys/<path segments>`.
fn key_url(machine: &Url, path: &str) -> StoreResult<Url> {
    let mut url = machine.clone();
    url.path_segments_mut()
        .map_err(|_| StoreError::Transport(format!("machine URL '{}' has no path", machine)))?
        .pop_if_empty()
        .extend(["v2", "keys"])
        .extend(path.split('/').filter(|s| !s.is_empty()));
    Ok(url)
}

fn decode(status: StatusCode, body: &[u8]) -> StoreResult<KeysResponse> {
    if status.is_success() {
        return serde_json::from_slice(body).map_err(|e| StoreError::Decode(e.to_string()));
    }

    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(error) => Err(StoreError::from_code(error.error_code, error.message, error.cause)),
        Err(_) => Err(StoreError::Remote {
            code: u32::from(status.as_u16()),
            message: status.to_string(),
            cause: String::from_utf8_lossy(body).into_owned(),
        }),
    }
}

fn flag(value: bool) -> String {
    value.to_string()
}

#[async_trait]
impl Store for EtcdClient {
    async fn create_dir(&self, path: &str, ttl: u64) -> StoreResult<Node> {
        let mut request = Request::new("create_dir", Method::PUT, path, self.request_timeout).ttl(ttl);
        request.form.push(("dir", flag(true)));
        request.form.push(("prevExist", flag(false)));
        Ok(self.execute(request).await?.node)
    }

    async fn create_in_order(&self, path: &str, value: &str, ttl: u64) -> StoreResult<Node> {
        let mut request = Request::new("create_in_order", Method::POST, path, self.request_timeout).ttl(ttl);
        request.form.push(("value", value.to_string()));
        request.idempotent = false;
        Ok(self.execute(request).await?.node)
    }

    async fn set(&self, path: &str, value: &str, ttl: u64) -> StoreResult<Node> {
        let mut request = Request::new("set", Method::PUT, path, self.request_timeout).ttl(ttl);
        request.form.push(("value", value.to_string()));
        Ok(self.execute(request).await?.node)
    }

    async fn get(&self, path: &str, sorted: bool, recursive: bool) -> StoreResult<Node> {
        let mut request = Request::new("get", Method::GET, path, self.request_timeout);
        request.query.push(("recursive", flag(recursive)));
        request.query.push(("sorted", flag(sorted)));
        Ok(self.execute(request).await?.node)
    }

    async fn watch(&self, path: &str, since_index: Option<u64>, recursive: bool) -> StoreResult<Node> {
        let mut request = Request::new("watch", Method::GET, path, self.request_timeout);
        request.timeout = None;
        request.query.push(("wait", flag(true)));
        request.query.push(("recursive", flag(recursive)));
        if let Some(index) = since_index {
            request.query.push(("waitIndex", index.to_string()));
        }
        let response = self.execute(request).await?;
        if response.removes(path) {
            tracing::info!(path, action = %response.action, removed = %response.node.key, "Watched key removed");
            return Err(StoreError::KeyNotFound(path.to_string()));
        }
        Ok(response.node)
    }
}
