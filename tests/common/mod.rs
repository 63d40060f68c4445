//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use etcd_bind::store::StoreResult;
use etcd_bind::{MemoryStore, Node, Store, StoreError};

/// Store operations, as seen by [`FaultyStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    CreateDir,
    CreateInOrder,
    Set,
    Get,
    Watch,
}

/// One recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    pub path: String,
}

/// A [`MemoryStore`] that records every call and fails the ones it is told to.
///
/// An injected "already exists" error on `create_dir` still creates the
/// directory, the way a concurrent writer would.
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    faults: Mutex<HashMap<(Op, String), StoreError>>,
    calls: Mutex<Vec<Call>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wrap(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Fail every `op` on `path` with `error`.
    pub fn fail(&self, op: Op, path: &str, error: StoreError) {
        self.faults.lock().unwrap().insert((op, path.to_string()), error);
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Paths passed to `op`, in call order.
    pub fn paths(&self, op: Op) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.op == op)
            .map(|call| call.path)
            .collect()
    }

    fn record(&self, op: Op, path: &str) -> Option<StoreError> {
        self.calls.lock().unwrap().push(Call {
            op,
            path: path.to_string(),
        });
        self.faults.lock().unwrap().get(&(op, path.to_string())).cloned()
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn create_dir(&self, path: &str, ttl: u64) -> StoreResult<Node> {
        match self.record(Op::CreateDir, path) {
            Some(error) if error.is_already_exists() => {
                let _ = self.inner.create_dir(path, ttl).await;
                Err(error)
            }
            Some(error) => Err(error),
            None => self.inner.create_dir(path, ttl).await,
        }
    }

    async fn create_in_order(&self, path: &str, value: &str, ttl: u64) -> StoreResult<Node> {
        match self.record(Op::CreateInOrder, path) {
            Some(error) => Err(error),
            None => self.inner.create_in_order(path, value, ttl).await,
        }
    }

    async fn set(&self, path: &str, value: &str, ttl: u64) -> StoreResult<Node> {
        match self.record(Op::Set, path) {
            Some(error) => Err(error),
            None => self.inner.set(path, value, ttl).await,
        }
    }

    async fn get(&self, path: &str, sorted: bool, recursive: bool) -> StoreResult<Node> {
        match self.record(Op::Get, path) {
            Some(error) => Err(error),
            None => self.inner.get(path, sorted, recursive).await,
        }
    }

    async fn watch(&self, path: &str, since_index: Option<u64>, recursive: bool) -> StoreResult<Node> {
        match self.record(Op::Watch, path) {
            Some(error) => Err(error),
            None => self.inner.watch(path, since_index, recursive).await,
        }
    }
}

/// An etcd "raft internal" failure, the generic error injected in tests.
pub fn raft_error(path: &str) -> StoreError {
    StoreError::from_code(300, "Raft Internal Error", path)
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Nested {
    pub subfield1: String,
}

etcd_bind::bind!(Nested { subfield1 => "/subfield1" });

/// Every supported kind, plus one untagged field.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Sample {
    pub field1: String,
    pub field2: i32,
    pub field3: i64,
    pub field4: bool,
    pub field5: Nested,
    pub field6: HashMap<String, String>,
    pub field7: Vec<String>,
    pub extra: String,
}

etcd_bind::bind!(Sample {
    field1 => "/field1",
    field2 => "/field2",
    field3 => "/field3",
    field4 => "/field4",
    field5 => "/field5",
    field6 => "/field6",
    field7 => "/field7",
});

pub fn sample() -> Sample {
    Sample {
        field1: "value1".to_string(),
        field2: 10,
        field3: 999,
        field4: true,
        field5: Nested {
            subfield1: "value2".to_string(),
        },
        field6: HashMap::from([("key1".to_string(), "value3".to_string())]),
        field7: vec!["value4".to_string(), "value5".to_string(), "value6".to_string()],
        extra: "never stored".to_string(),
    }
}

/// The store tree `sample()` saves to.
pub fn sample_tree() -> Node {
    Node::directory(
        "",
        vec![
            Node::leaf("/field1", "value1"),
            Node::leaf("/field2", "10"),
            Node::leaf("/field3", "999"),
            Node::leaf("/field4", "true"),
            Node::directory("/field5", vec![Node::leaf("/field5/subfield1", "value2")]),
            Node::directory("/field6", vec![Node::leaf("/field6/key1", "value3")]),
            Node::directory(
                "/field7",
                vec![
                    Node::leaf("/field7/0", "value4"),
                    Node::leaf("/field7/1", "value5"),
                    Node::leaf("/field7/2", "value6"),
                ],
            ),
        ],
    )
}

/// Untagged fields named after the tagged path `/field1`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Shadowed {
    pub primary: String,
    pub field1: String,
    pub field1_shadow: String,
}

etcd_bind::bind!(Shadowed { primary => "/field1" });

pub fn shadowed() -> Shadowed {
    Shadowed {
        primary: "tagged".to_string(),
        field1: "local".to_string(),
        field1_shadow: "also local".to_string(),
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Endpoint {
    pub host: String,
    pub port: i32,
}

etcd_bind::bind!(Endpoint {
    host => "/host",
    port => "/port",
});

/// Lists of every element kind and an optional map.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Collections {
    pub numbers: Vec<i64>,
    pub flags: Vec<bool>,
    pub endpoints: Vec<Endpoint>,
    pub labels: Option<HashMap<String, String>>,
}

etcd_bind::bind!(Collections {
    numbers => "/numbers",
    flags => "/flags",
    endpoints => "/endpoints",
    labels => "/labels",
});

pub fn collections() -> Collections {
    Collections {
        numbers: vec![3, -1, 40],
        flags: vec![true, false],
        endpoints: vec![
            Endpoint {
                host: "a.local".to_string(),
                port: 80,
            },
            Endpoint {
                host: "b.local".to_string(),
                port: 81,
            },
        ],
        labels: Some(HashMap::from([
            ("zone".to_string(), "eu".to_string()),
            ("tier".to_string(), "gold".to_string()),
        ])),
    }
}
