//! Save against the in-memory and fault-injecting stores.

use std::sync::Arc;

use etcd_bind::binding::save;
use etcd_bind::{Client, Error, MemoryStore, PathRegistry, Store, StoreError};

mod common;

use common::{collections, raft_error, sample, sample_tree, shadowed, FaultyStore, Op, Sample};

#[tokio::test]
async fn test_save_writes_expected_tree() {
    let store = Arc::new(MemoryStore::new());
    let client = Client::new(store.clone(), sample());

    client.save().await.unwrap();

    let expected = MemoryStore::with_root(sample_tree()).snapshot();
    let actual = store.snapshot();
    assert_eq!(strip_indexes(actual), strip_indexes(expected));
}

#[tokio::test]
async fn test_save_skips_untagged_fields() {
    let store = Arc::new(FaultyStore::new());
    let client = Client::new(store.clone(), sample());

    client.save().await.unwrap();

    assert!(store.calls().iter().all(|call| !call.path.contains("extra")));
    assert!(client.registry().entries().iter().all(|d| !d.path.contains("extra")));
}

#[tokio::test]
async fn test_save_ignores_untagged_fields_named_like_a_tagged_path() {
    let store = Arc::new(FaultyStore::new());
    let client = Client::new(store.clone(), shadowed());

    client.save().await.unwrap();

    assert_eq!(store.paths(Op::Set), vec!["/field1"]);
    assert!(store.calls().iter().all(|call| !call.path.contains("shadow")));
    assert_eq!(store.inner().value("/field1").as_deref(), Some("tagged"));
    assert_eq!(client.registry().len(), 1);
}

#[tokio::test]
async fn test_save_issues_calls_in_declaration_order() {
    let store = Arc::new(FaultyStore::new());
    Client::new(store.clone(), sample()).save().await.unwrap();

    assert_eq!(
        store.paths(Op::Set),
        vec!["/field1", "/field2", "/field3", "/field4", "/field5/subfield1", "/field6/key1"]
    );
    assert_eq!(store.paths(Op::CreateDir), vec!["/field6", "/field7"]);
    assert_eq!(store.paths(Op::CreateInOrder), vec!["/field7", "/field7", "/field7"]);
}

#[tokio::test]
async fn test_existing_directory_is_tolerated() {
    let store = Arc::new(FaultyStore::new());
    store.fail(Op::CreateDir, "/field6", StoreError::NodeExists("/field6".into()));
    store.fail(Op::CreateDir, "/field7", StoreError::NodeExists("/field7".into()));

    Client::new(store.clone(), sample()).save().await.unwrap();

    assert_eq!(store.inner().value("/field6/key1").as_deref(), Some("value3"));
    assert_eq!(store.inner().value("/field7/2").as_deref(), Some("value6"));
}

#[tokio::test]
async fn test_save_twice_keeps_scalars_stable() {
    let store = Arc::new(MemoryStore::new());
    let client = Client::new(store.clone(), sample());

    client.save().await.unwrap();
    client.save().await.unwrap();

    assert_eq!(store.value("/field1").as_deref(), Some("value1"));
    assert_eq!(store.value("/field5/subfield1").as_deref(), Some("value2"));
    assert_eq!(store.value("/field6/key1").as_deref(), Some("value3"));

    let field7 = store.get("/field7", true, false).await.unwrap();
    let values: Vec<_> = field7.nodes.iter().map(|n| n.value.as_str()).collect();
    assert_eq!(values, vec!["value4", "value5", "value6"]);
}

#[tokio::test]
async fn test_set_failure_stops_traversal_with_path() {
    let store = Arc::new(FaultyStore::new());
    store.fail(Op::Set, "/field2", raft_error("/field2"));

    let err = Client::new(store.clone(), sample()).save().await.unwrap_err();

    assert_eq!(err.path(), Some("/field2"));
    assert_eq!(err.store_error().and_then(StoreError::code), Some(300));
    // Written before the failure, and nothing after it.
    assert_eq!(store.inner().value("/field1").as_deref(), Some("value1"));
    assert!(store.inner().value("/field3").is_none());
}

#[tokio::test]
async fn test_directory_failure_is_reported() {
    let store = Arc::new(FaultyStore::new());
    store.fail(Op::CreateDir, "/field7", raft_error("/field7"));

    let err = Client::new(store.clone(), sample()).save().await.unwrap_err();
    assert!(matches!(err, Error::Store { ref path, .. } if path == "/field7"));
    assert!(store.paths(Op::CreateInOrder).is_empty());
}

#[tokio::test]
async fn test_append_failure_is_reported() {
    let store = Arc::new(FaultyStore::new());
    store.fail(Op::CreateInOrder, "/field7", raft_error("/field7"));

    let err = Client::new(store.clone(), sample()).save().await.unwrap_err();
    assert_eq!(err.path(), Some("/field7"));
    assert_eq!(store.paths(Op::CreateInOrder).len(), 1);
}

#[tokio::test]
async fn test_scalar_over_directory_is_type_mismatch() {
    let store = Arc::new(MemoryStore::new());
    store.set("/field1/inner", "x", 0).await.unwrap();

    let err = Client::new(store, sample()).save().await.unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { ref path, .. } if path == "/field1"));
}

#[tokio::test]
async fn test_collections_layout() {
    let store = Arc::new(MemoryStore::new());
    Client::new(store.clone(), collections()).save().await.unwrap();

    assert_eq!(store.value("/numbers/0").as_deref(), Some("3"));
    assert_eq!(store.value("/numbers/1").as_deref(), Some("-1"));
    assert_eq!(store.value("/numbers/2").as_deref(), Some("40"));
    assert_eq!(store.value("/flags/1").as_deref(), Some("false"));
    assert_eq!(store.value("/endpoints/0/host").as_deref(), Some("a.local"));
    assert_eq!(store.value("/endpoints/1/port").as_deref(), Some("81"));
    assert_eq!(store.value("/labels/tier").as_deref(), Some("gold"));
}

#[tokio::test]
async fn test_unallocated_map_creates_empty_directory() {
    let store = Arc::new(MemoryStore::new());
    let mut value = collections();
    value.labels = None;

    Client::new(store.clone(), value).save().await.unwrap();

    let labels = store.get("/labels", true, false).await.unwrap();
    assert!(labels.dir);
    assert!(labels.nodes.is_empty());
}

#[tokio::test]
async fn test_save_applies_client_ttl() {
    let store = Arc::new(MemoryStore::new());
    Client::new(store.clone(), sample())
        .with_ttl(30)
        .save()
        .await
        .unwrap();

    let field7 = store.get("/field7", true, true).await.unwrap();
    assert_eq!(field7.ttl, Some(30));
    assert!(field7.nodes.iter().all(|n| n.ttl == Some(30)));
}

#[tokio::test]
async fn test_save_rejects_non_structures() {
    let store = MemoryStore::new();
    let mut not_a_struct = vec![1i32, 2, 3];

    let err = save(&store, &mut not_a_struct, &PathRegistry::new(), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Structural { .. }));
    assert_eq!(store.index(), 0);
}

#[tokio::test]
async fn test_save_registers_every_field() {
    let store = Arc::new(MemoryStore::new());
    let client = Client::new(store, Sample::default());
    client.save().await.unwrap();

    // Empty list and map: the containers are registered, no children.
    let paths: Vec<_> = client.registry().entries().into_iter().map(|d| d.path).collect();
    assert_eq!(
        paths,
        vec!["/field1", "/field2", "/field3", "/field4", "/field5", "/field5/subfield1", "/field6", "/field7"]
    );
}

fn strip_indexes(mut node: etcd_bind::Node) -> etcd_bind::Node {
    node.modified_index = 0;
    node.created_index = 0;
    node.nodes = node.nodes.into_iter().map(strip_indexes).collect();
    node
}
