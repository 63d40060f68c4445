//! Store node shape, as exchanged with etcd's v2 keys API.

use serde::{Deserialize, Serialize};

/// A leaf or a directory in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Absolute path of the node (e.g. "/field7/0").
    #[serde(default)]
    pub key: String,

    /// Leaf value. Always empty for directories.
    #[serde(default)]
    pub value: String,

    /// True for directories.
    #[serde(default)]
    pub dir: bool,

    /// Remaining time to live in seconds, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,

    /// Children of a directory, in the order the store returned them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Node>,

    #[serde(default, rename = "modifiedIndex")]
    pub modified_index: u64,

    #[serde(default, rename = "createdIndex")]
    pub created_index: u64,
}

impl Node {
    /// Create a leaf node.
    pub fn leaf(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    /// Create a directory node with the given children.
    pub fn directory(key: impl Into<String>, nodes: Vec<Node>) -> Self {
        Self {
            key: key.into(),
            dir: true,
            nodes,
            ..Default::default()
        }
    }

    /// Last path segment of the key ("/field6/key1" → "key1").
    pub fn name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or_default()
    }

    /// Highest modification index anywhere in this subtree.
    pub fn max_modified_index(&self) -> u64 {
        self.nodes
            .iter()
            .map(Node::max_modified_index)
            .fold(self.modified_index, u64::max)
    }

    /// Find a descendant by absolute key.
    pub fn find(&self, key: &str) -> Option<&Node> {
        if self.key == key {
            return Some(self);
        }
        self.nodes.iter().find_map(|child| child.find(key))
    }
}
