//! MySqlSaver against a live server
//!
//! Runs the same conformance checks as the in-memory saver.

mod common;

use common::TestDatabase;
use graphckpt_common::testing;
use graphckpt_common::CheckpointSaver;
use graphckpt_mysql::migrations::{get_schema_version, CHECKPOINT_MIGRATIONS, CHECKPOINT_MIGRATIONS_TABLE};
use graphckpt_mysql::MySqlSaver;
use serde_json::{json, Map};

async fn with_saver<F, Fut>(check: F)
where
    F: FnOnce(MySqlSaver) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let Some(db) = TestDatabase::create().await else {
        return;
    };
    let saver = MySqlSaver::from_conn_string(&db.uri).await.expect("connect");
    saver.setup().await.expect("setup");

    let pool = saver.pool().clone();
    check(saver).await;

    pool.close().await;
    db.drop().await;
}

#[tokio::test]
async fn test_setup_is_idempotent() {
    with_saver(|saver| async move {
        let expected = CHECKPOINT_MIGRATIONS.len() as i32 - 1;
        let version = get_schema_version(saver.pool(), CHECKPOINT_MIGRATIONS_TABLE)
            .await
            .expect("version");
        assert_eq!(version, expected);

        saver.setup().await.expect("second setup");
        let version = get_schema_version(saver.pool(), CHECKPOINT_MIGRATIONS_TABLE)
            .await
            .expect("version");
        assert_eq!(version, expected);
    })
    .await;
}

#[tokio::test]
async fn test_search() {
    with_saver(|saver| async move { testing::check_search(&saver).await }).await;
}

#[tokio::test]
async fn test_list_order_before_and_limit() {
    with_saver(|saver| async move { testing::check_list_order_before_and_limit(&saver).await }).await;
}

#[tokio::test]
async fn test_parent_config() {
    with_saver(|saver| async move { testing::check_parent_config(&saver).await }).await;
}

#[tokio::test]
async fn test_null_chars() {
    with_saver(|saver| async move { testing::check_null_chars(&saver).await }).await;
}

#[tokio::test]
async fn test_write_and_read_pending_writes_and_sends() {
    with_saver(|saver| async move { testing::check_pending_writes_and_sends(&saver).await }).await;
}

#[tokio::test]
async fn test_write_and_read_channel_values() {
    with_saver(|saver| async move {
        let mut values = Map::new();
        values.insert("channel1".to_string(), json!("channel1v"));
        testing::check_channel_values(&saver, values).await;
    })
    .await;
}

#[tokio::test]
async fn test_write_and_read_empty_channel_values() {
    with_saver(|saver| async move { testing::check_channel_values(&saver, Map::new()).await }).await;
}

#[tokio::test]
async fn test_write_and_read_pending_writes() {
    with_saver(|saver| async move { testing::check_pending_writes(&saver).await }).await;
}

#[tokio::test]
async fn test_pending_sends_come_from_parent() {
    with_saver(|saver| async move { testing::check_pending_sends_from_parent(&saver).await }).await;
}

#[tokio::test]
async fn test_existing_blobs_are_kept() {
    with_saver(|saver| async move { testing::check_existing_blobs_are_kept(&saver).await }).await;
}

#[tokio::test]
async fn test_regular_writes_keep_first() {
    with_saver(|saver| async move { testing::check_regular_writes_keep_first(&saver).await }).await;
}

#[tokio::test]
async fn test_missing_checkpoint_is_none() {
    with_saver(|saver| async move {
        let config = graphckpt_common::CheckpointConfig::thread("nobody");
        assert!(saver.get_tuple(&config).await.expect("get_tuple").is_none());
        assert!(saver.get(&config).await.expect("get").is_none());
    })
    .await;
}
