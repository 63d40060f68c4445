//! In-process hierarchical store.
//!
//! # Responsibilities
//! - Keep a directory/leaf tree with etcd v2 semantics
//! - Number in-order children with increasing numeric suffixes
//! - Record every change with a monotonically increasing index
//! - Serve blocking watches from history (since_index) or live notifications
//!
//! TTLs are recorded on nodes but never expire.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::store::{Node, Store, StoreError, StoreResult};

/// Number of change events retained for `since_index` replays.
const HISTORY_LIMIT: usize = 1000;

struct State {
    root: Node,
    index: u64,
    history: VecDeque<Node>,
    truncated: bool,
}

impl State {
    fn next_index(&mut self) -> u64 {
        self.index += 1;
        self.index
    }

    fn record(&mut self, node: Node) {
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
            self.truncated = true;
        }
        self.history.push_back(node);
    }
}

/// A [`Store`] held entirely in memory.
pub struct MemoryStore {
    state: Mutex<State>,
    events: broadcast::Sender<Node>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::with_root(Node::directory("", Vec::new()))
    }

    /// Create a store seeded with an existing tree. The root must be a
    /// directory; keys below it are expected to be absolute.
    pub fn with_root(mut root: Node) -> Self {
        root.key.clear();
        root.dir = true;
        let index = root.max_modified_index();
        let (events, _) = broadcast::channel(256);
        Self {
            state: Mutex::new(State {
                root,
                index,
                history: VecDeque::new(),
                truncated: false,
            }),
            events,
        }
    }

    /// Snapshot of the whole tree, children sorted by key.
    pub fn snapshot(&self) -> Node {
        let mut root = self.lock().root.clone();
        sort_recursive(&mut root);
        root
    }

    /// Current store index (the index of the last change).
    pub fn index(&self) -> u64 {
        self.lock().index
    }

    /// Value of the leaf at `path`, if there is one.
    pub fn value(&self, path: &str) -> Option<String> {
        let state = self.lock();
        lookup(&state.root, &segments(path))
            .filter(|node| !node.dir)
            .map(|node| node.value.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &mut State, node: &Node) {
        state.record(node.clone());
        // No receivers simply means nobody is watching.
        let _ = self.events.send(node.clone());
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_dir(&self, path: &str, ttl: u64) -> StoreResult<Node> {
        let segs = segments(path);
        let Some((last, parents)) = segs.split_last() else {
            return Err(StoreError::NodeExists("/".to_string()));
        };

        let mut guard = self.lock();
        let state = &mut *guard;
        let index = state.index + 1;
        let parent = ensure_dir(&mut state.root, parents, index)?;
        let key = child_key(&parent.key, last);
        if parent.nodes.iter().any(|n| n.key == key) {
            return Err(StoreError::NodeExists(key));
        }

        let node = Node {
            key,
            dir: true,
            ttl: ttl_of(ttl),
            modified_index: index,
            created_index: index,
            ..Default::default()
        };
        parent.nodes.push(node.clone());
        state.next_index();
        self.publish(state, &node);
        Ok(node)
    }

    async fn create_in_order(&self, path: &str, value: &str, ttl: u64) -> StoreResult<Node> {
        let segs = segments(path);

        let mut guard = self.lock();
        let state = &mut *guard;
        let index = state.index + 1;
        let dir = ensure_dir(&mut state.root, &segs, index)?;
        let position = dir
            .nodes
            .iter()
            .filter_map(|n| n.name().parse::<u64>().ok())
            .max()
            .map_or(0, |max| max + 1);

        let node = Node {
            key: child_key(&dir.key, &position.to_string()),
            value: value.to_string(),
            ttl: ttl_of(ttl),
            modified_index: index,
            created_index: index,
            ..Default::default()
        };
        dir.nodes.push(node.clone());
        state.next_index();
        self.publish(state, &node);
        Ok(node)
    }

    async fn set(&self, path: &str, value: &str, ttl: u64) -> StoreResult<Node> {
        let segs = segments(path);
        let Some((last, parents)) = segs.split_last() else {
            return Err(StoreError::NotFile("/".to_string()));
        };

        let mut guard = self.lock();
        let state = &mut *guard;
        let index = state.index + 1;
        let parent = ensure_dir(&mut state.root, parents, index)?;
        let key = child_key(&parent.key, last);

        let node = match parent.nodes.iter_mut().find(|n| n.key == key) {
            Some(existing) if existing.dir => return Err(StoreError::NotFile(key)),
            Some(existing) => {
                existing.value = value.to_string();
                existing.ttl = ttl_of(ttl);
                existing.modified_index = index;
                existing.clone()
            }
            None => {
                let node = Node {
                    key,
                    value: value.to_string(),
                    ttl: ttl_of(ttl),
                    modified_index: index,
                    created_index: index,
                    ..Default::default()
                };
                parent.nodes.push(node.clone());
                node
            }
        };
        state.next_index();
        self.publish(state, &node);
        Ok(node)
    }

    async fn get(&self, path: &str, sorted: bool, recursive: bool) -> StoreResult<Node> {
        let segs = segments(path);
        let state = self.lock();
        let mut node = lookup(&state.root, &segs)
            .cloned()
            .ok_or_else(|| StoreError::KeyNotFound(normalize(path)))?;
        drop(state);

        if !recursive {
            for child in &mut node.nodes {
                child.nodes.clear();
            }
        }
        if sorted {
            sort_recursive(&mut node);
        }
        Ok(node)
    }

    async fn watch(&self, path: &str, since_index: Option<u64>, recursive: bool) -> StoreResult<Node> {
        let key = normalize(path);
        let mut rx = {
            let state = self.lock();
            if lookup(&state.root, &segments(path)).is_none() {
                return Err(StoreError::KeyNotFound(key));
            }

            if let Some(since) = since_index {
                let oldest = state.history.front().map(|n| n.modified_index);
                if state.truncated && oldest.is_some_and(|oldest| since < oldest) {
                    return Err(StoreError::EventIndexCleared(key));
                }
                if let Some(event) = state
                    .history
                    .iter()
                    .find(|n| n.modified_index >= since && covers(&key, &n.key, recursive))
                {
                    return Ok(event.clone());
                }
            }
            self.events.subscribe()
        };

        loop {
            match rx.recv().await {
                Ok(node) if covers(&key, &node.key, recursive) => return Ok(node),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(path = %key, skipped, "Watcher lagged behind store events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(StoreError::Transport("memory store closed".to_string()));
                }
            }
        }
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn normalize(path: &str) -> String {
    let segs = segments(path);
    if segs.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segs.join("/"))
    }
}

fn child_key(parent: &str, name: &str) -> String {
    format!("{}/{}", parent, name)
}

fn ttl_of(ttl: u64) -> Option<i64> {
    (ttl > 0).then(|| i64::try_from(ttl).unwrap_or(i64::MAX))
}

fn covers(watched: &str, changed: &str, recursive: bool) -> bool {
    if watched == "/" {
        return recursive || changed == "/";
    }
    changed == watched
        || (recursive
            && changed
                .strip_prefix(watched)
                .is_some_and(|rest| rest.starts_with('/')))
}

fn lookup<'a>(root: &'a Node, segs: &[&str]) -> Option<&'a Node> {
    let mut current = root;
    for seg in segs {
        let key = child_key(&current.key, seg);
        current = current.nodes.iter().find(|n| n.key == key)?;
    }
    Some(current)
}

/// Walk `segs` below `root`, creating missing directories on the way.
fn ensure_dir<'a>(root: &'a mut Node, segs: &[&str], index: u64) -> StoreResult<&'a mut Node> {
    let mut current = root;
    for seg in segs {
        let key = child_key(&current.key, seg);
        let position = match current.nodes.iter().position(|n| n.key == key) {
            Some(position) if !current.nodes[position].dir => return Err(StoreError::NotDir(key)),
            Some(position) => position,
            None => {
                current.nodes.push(Node {
                    key,
                    dir: true,
                    modified_index: index,
                    created_index: index,
                    ..Default::default()
                });
                current.nodes.len() - 1
            }
        };
        current = &mut current.nodes[position];
    }
    Ok(current)
}

fn sort_recursive(node: &mut Node) {
    node.nodes.sort_by(|a, b| a.key.cmp(&b.key));
    for child in &mut node.nodes {
        sort_recursive(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_set_creates_parent_directories() {
        let store = MemoryStore::new();
        store.set("/a/b/c", "value", 0).await.unwrap();

        let a = store.get("/a", true, true).await.unwrap();
        assert!(a.dir);
        assert_eq!(a.nodes[0].key, "/a/b");
        assert_eq!(a.nodes[0].nodes[0].value, "value");
    }

    #[tokio::test]
    async fn test_set_over_directory_is_not_file() {
        let store = MemoryStore::new();
        store.create_dir("/dir", 0).await.unwrap();
        let err = store.set("/dir", "value", 0).await.unwrap_err();
        assert_eq!(err, StoreError::NotFile("/dir".into()));
    }

    #[tokio::test]
    async fn test_create_dir_twice_reports_node_exists() {
        let store = MemoryStore::new();
        store.create_dir("/dir", 0).await.unwrap();
        let err = store.create_dir("/dir", 0).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_parent_leaf_is_not_dir() {
        let store = MemoryStore::new();
        store.set("/leaf", "x", 0).await.unwrap();
        let err = store.set("/leaf/child", "y", 0).await.unwrap_err();
        assert_eq!(err, StoreError::NotDir("/leaf".into()));
    }

    #[tokio::test]
    async fn test_create_in_order_numbers_children() {
        let store = MemoryStore::new();
        for value in ["value4", "value5", "value6"] {
            store.create_in_order("/field7", value, 0).await.unwrap();
        }
        assert_eq!(store.value("/field7/0").as_deref(), Some("value4"));
        assert_eq!(store.value("/field7/1").as_deref(), Some("value5"));
        assert_eq!(store.value("/field7/2").as_deref(), Some("value6"));
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let store = MemoryStore::new();
        let err = store.get("/nothing", false, false).await.unwrap_err();
        assert_eq!(err, StoreError::KeyNotFound("/nothing".into()));
    }

    #[tokio::test]
    async fn test_get_without_recursion_is_shallow() {
        let store = MemoryStore::new();
        store.set("/a/b/c", "value", 0).await.unwrap();
        let a = store.get("/a", false, false).await.unwrap();
        assert_eq!(a.nodes.len(), 1);
        assert!(a.nodes[0].nodes.is_empty());
    }

    #[tokio::test]
    async fn test_ttl_is_recorded() {
        let store = MemoryStore::new();
        let node = store.set("/ephemeral", "x", 30).await.unwrap();
        assert_eq!(node.ttl, Some(30));
    }

    #[tokio::test]
    async fn test_watch_replays_history_from_index() {
        let store = MemoryStore::new();
        let first = store.set("/key", "one", 0).await.unwrap();
        store.set("/key", "two", 0).await.unwrap();

        let node = store
            .watch("/key", Some(first.modified_index + 1), false)
            .await
            .unwrap();
        assert_eq!(node.value, "two");
    }

    #[tokio::test]
    async fn test_watch_receives_live_change() {
        let store = Arc::new(MemoryStore::new());
        store.set("/dir/key", "one", 0).await.unwrap();

        let watcher = {
            let store = store.clone();
            tokio::spawn(async move { store.watch("/dir", Some(store.index() + 1), true).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.set("/dir/key", "two", 0).await.unwrap();

        let node = watcher.await.unwrap().unwrap();
        assert_eq!(node.key, "/dir/key");
        assert_eq!(node.value, "two");
    }

    #[tokio::test]
    async fn test_watch_missing_key_fails() {
        let store = MemoryStore::new();
        let err = store.watch("/missing", None, false).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_covers() {
        assert!(covers("/a", "/a", false));
        assert!(!covers("/a", "/a/b", false));
        assert!(covers("/a", "/a/b", true));
        assert!(!covers("/a", "/ab", true));
        assert!(covers("/", "/anything", true));
    }
}
