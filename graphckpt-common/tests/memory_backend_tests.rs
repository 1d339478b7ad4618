//! Conformance tests for the in-memory saver and store
//!
//! Same scenarios the MySQL backend runs in graphckpt-mysql/tests.

use graphckpt_common::testing;
use graphckpt_common::{InMemorySaver, InMemoryStore};
use serde_json::{json, Map};

#[tokio::test]
async fn test_search() {
    testing::check_search(&InMemorySaver::new()).await;
}

#[tokio::test]
async fn test_list_order_before_and_limit() {
    testing::check_list_order_before_and_limit(&InMemorySaver::new()).await;
}

#[tokio::test]
async fn test_parent_config() {
    testing::check_parent_config(&InMemorySaver::new()).await;
}

#[tokio::test]
async fn test_null_chars() {
    testing::check_null_chars(&InMemorySaver::new()).await;
}

#[tokio::test]
async fn test_write_and_read_pending_writes_and_sends() {
    testing::check_pending_writes_and_sends(&InMemorySaver::new()).await;
}

#[tokio::test]
async fn test_write_and_read_channel_values() {
    let mut values = Map::new();
    values.insert("channel1".to_string(), json!("channel1v"));
    testing::check_channel_values(&InMemorySaver::new(), values).await;
}

#[tokio::test]
async fn test_write_and_read_empty_channel_values() {
    // Versions without values must not surface as channel values
    testing::check_channel_values(&InMemorySaver::new(), Map::new()).await;
}

#[tokio::test]
async fn test_write_and_read_pending_writes() {
    testing::check_pending_writes(&InMemorySaver::new()).await;
}

#[tokio::test]
async fn test_pending_sends_come_from_parent() {
    testing::check_pending_sends_from_parent(&InMemorySaver::new()).await;
}

#[tokio::test]
async fn test_existing_blobs_are_kept() {
    testing::check_existing_blobs_are_kept(&InMemorySaver::new()).await;
}

#[tokio::test]
async fn test_regular_writes_keep_first() {
    testing::check_regular_writes_keep_first(&InMemorySaver::new()).await;
}

#[tokio::test]
async fn test_store_roundtrip() {
    testing::check_store_roundtrip(&InMemoryStore::new()).await;
}

#[tokio::test]
async fn test_store_search_and_namespaces() {
    testing::check_store_search_and_namespaces(&InMemoryStore::new()).await;
}

#[tokio::test]
async fn test_store_search_rejects_bad_prefix() {
    testing::check_store_search_rejects_bad_prefix(&InMemoryStore::new()).await;
}
