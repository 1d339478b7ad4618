//! Backend conformance checks
//!
//! Every backend runs the same scenarios so in-memory and MySQL behavior
//! cannot drift apart. Each check expects a fresh, empty backend.

use crate::checkpoint::{
    create_checkpoint, empty_checkpoint, ChannelVersions, Checkpoint, CheckpointMetadata,
    CheckpointSaver, ListOptions, PendingWrite, TASKS,
};
use crate::config::CheckpointConfig;
use crate::store::{namespace, ListNamespacesOptions, SearchOptions, Store};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

pub struct TestData {
    pub configs: Vec<CheckpointConfig>,
    pub checkpoints: Vec<Checkpoint>,
    pub metadata: Vec<CheckpointMetadata>,
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn test_data() -> TestData {
    let configs = vec![
        // Legacy key, for backwards compatibility
        serde_json::from_value(json!({
            "thread_id": "thread-1",
            "thread_ts": "1",
            "checkpoint_ns": "",
        }))
        .expect("valid config"),
        CheckpointConfig::thread("thread-2")
            .with_ns("")
            .with_checkpoint_id("2"),
        CheckpointConfig::thread("thread-2")
            .with_ns("inner")
            .with_checkpoint_id("2-inner"),
    ];

    let chkpnt_1 = empty_checkpoint();
    let chkpnt_2 = create_checkpoint(&chkpnt_1, Map::new(), 1, None);
    let chkpnt_3 = empty_checkpoint();

    let metadata = vec![
        object(json!({"source": "input", "step": 2, "writes": {}, "score": 1})),
        object(json!({"source": "loop", "step": 1, "writes": {"foo": "bar"}, "score": null})),
        Map::new(),
    ];

    TestData {
        configs,
        checkpoints: vec![chkpnt_1, chkpnt_2, chkpnt_3],
        metadata,
    }
}

pub async fn check_search(saver: &dyn CheckpointSaver) {
    let data = test_data();
    for i in 0..3 {
        saver
            .put(
                &data.configs[i],
                data.checkpoints[i].clone(),
                data.metadata[i].clone(),
                ChannelVersions::new(),
            )
            .await
            .expect("put");
    }

    let by_filter = |filter: Value| ListOptions::default().filter(object(filter));

    let results = saver.list(None, by_filter(json!({"source": "input"}))).await.expect("list");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].metadata, data.metadata[0]);

    let results = saver
        .list(None, by_filter(json!({"step": 1, "writes": {"foo": "bar"}})))
        .await
        .expect("list");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].metadata, data.metadata[1]);

    let results = saver.list(None, by_filter(json!({}))).await.expect("list");
    assert_eq!(results.len(), 3);

    let results = saver
        .list(None, by_filter(json!({"source": "update", "step": 1})))
        .await
        .expect("list");
    assert!(results.is_empty());

    // Config without a namespace spans every namespace of the thread
    let results = saver
        .list(Some(&CheckpointConfig::thread("thread-2")), ListOptions::default())
        .await
        .expect("list");
    assert_eq!(results.len(), 2);
    let namespaces: HashSet<String> = results
        .iter()
        .map(|t| t.config.ns().to_string())
        .collect();
    assert_eq!(namespaces, HashSet::from(["".to_string(), "inner".to_string()]));
}

pub async fn check_list_order_before_and_limit(saver: &dyn CheckpointSaver) {
    let base = CheckpointConfig::thread("thread-order").with_ns("");
    for id in ["1", "2", "3", "4"] {
        let mut checkpoint = empty_checkpoint();
        checkpoint.id = id.to_string();
        saver
            .put(&base, checkpoint, Map::new(), ChannelVersions::new())
            .await
            .expect("put");
    }

    let ids = |tuples: Vec<crate::CheckpointTuple>| -> Vec<String> {
        tuples.into_iter().map(|t| t.checkpoint.id).collect()
    };

    let all = saver.list(Some(&base), ListOptions::default()).await.expect("list");
    assert_eq!(ids(all), vec!["4", "3", "2", "1"]);

    let before = saver
        .list(
            Some(&base),
            ListOptions::default().before(base.clone().with_checkpoint_id("3")),
        )
        .await
        .expect("list");
    assert_eq!(ids(before), vec!["2", "1"]);

    let limited = saver
        .list(Some(&base), ListOptions::default().limit(2))
        .await
        .expect("list");
    assert_eq!(ids(limited), vec!["4", "3"]);

    // Zero is no limit at all
    let unlimited = saver
        .list(Some(&base), ListOptions::default().limit(0))
        .await
        .expect("list");
    assert_eq!(ids(unlimited), vec!["4", "3", "2", "1"]);

    let latest = saver.get_tuple(&base).await.expect("get").expect("some");
    assert_eq!(latest.checkpoint.id, "4");
}

pub async fn check_parent_config(saver: &dyn CheckpointSaver) {
    let base = CheckpointConfig::thread("thread-parent").with_ns("");
    let mut first = empty_checkpoint();
    first.id = "1".to_string();
    let first_config = saver
        .put(&base, first, Map::new(), ChannelVersions::new())
        .await
        .expect("put");
    assert_eq!(first_config.checkpoint_id.as_deref(), Some("1"));

    let mut second = empty_checkpoint();
    second.id = "2".to_string();
    let second_config = saver
        .put(&first_config, second, Map::new(), ChannelVersions::new())
        .await
        .expect("put");

    let tuple = saver.get_tuple(&second_config).await.expect("get").expect("some");
    assert_eq!(tuple.parent_config, Some(first_config.clone()));

    let root = saver.get_tuple(&first_config).await.expect("get").expect("some");
    assert!(root.parent_config.is_none());
}

pub async fn check_null_chars(saver: &dyn CheckpointSaver) {
    let data = test_data();
    let config = saver
        .put(
            &data.configs[0],
            data.checkpoints[0].clone(),
            object(json!({"my_key": "\u{0000}abc"})),
            ChannelVersions::new(),
        )
        .await
        .expect("put");

    let tuple = saver.get_tuple(&config).await.expect("get").expect("some");
    assert_eq!(tuple.metadata["my_key"], json!("abc"));

    let results = saver
        .list(None, ListOptions::default().filter(object(json!({"my_key": "abc"}))))
        .await
        .expect("list");
    assert_eq!(results[0].metadata["my_key"], json!("abc"));
}

pub async fn check_pending_writes_and_sends(saver: &dyn CheckpointSaver) {
    let data = test_data();
    let config = CheckpointConfig::thread("thread-1")
        .with_ns("")
        .with_checkpoint_id("1");
    let chkpnt = create_checkpoint(&data.checkpoints[0], Map::new(), 1, Some("1".to_string()));

    saver
        .put(&config, chkpnt, Map::new(), ChannelVersions::new())
        .await
        .expect("put");
    saver
        .put_writes(
            &config,
            vec![("w1".to_string(), json!("w1v")), ("w2".to_string(), json!("w2v"))],
            "world",
        )
        .await
        .expect("put_writes");
    saver
        .put_writes(&config, vec![(TASKS.to_string(), json!("w3v"))], "hello")
        .await
        .expect("put_writes");

    let results = saver.list(None, ListOptions::default()).await.expect("list");
    let result = &results[0];

    assert_eq!(
        result.pending_writes,
        vec![
            PendingWrite::new("hello", TASKS, json!("w3v")),
            PendingWrite::new("world", "w1", json!("w1v")),
            PendingWrite::new("world", "w2", json!("w2v")),
        ]
    );
    assert_eq!(result.checkpoint.pending_sends, vec![json!("w3v")]);
}

pub async fn check_channel_values(saver: &dyn CheckpointSaver, channel_values: Map<String, Value>) {
    let config = CheckpointConfig::thread("thread-4")
        .with_ns("")
        .with_checkpoint_id("4");
    let mut chkpnt = empty_checkpoint();
    chkpnt.id = "4".to_string();
    chkpnt.channel_values = channel_values.clone();

    let new_versions: ChannelVersions = [
        ("channel1".to_string(), "1".to_string()),
        ("channel:with:colon".to_string(), "1".to_string()),
    ]
    .into_iter()
    .collect();
    chkpnt.channel_versions = new_versions.clone();

    saver
        .put(&config, chkpnt, Map::new(), new_versions)
        .await
        .expect("put");

    let results = saver.list(None, ListOptions::default()).await.expect("list");
    assert_eq!(results[0].checkpoint.channel_values, channel_values);
}

pub async fn check_pending_writes(saver: &dyn CheckpointSaver) {
    let config = CheckpointConfig::thread("thread-5")
        .with_ns("")
        .with_checkpoint_id("5");
    let mut chkpnt = empty_checkpoint();
    chkpnt.id = "5".to_string();
    let task_id = "task1";

    saver
        .put(&config, chkpnt, Map::new(), ChannelVersions::new())
        .await
        .expect("put");
    saver
        .put_writes(
            &config,
            vec![
                ("channel1".to_string(), json!("somevalue")),
                ("channel2".to_string(), json!([1, 2, 3])),
                ("channel3".to_string(), Value::Null),
            ],
            task_id,
        )
        .await
        .expect("put_writes");

    let results = saver.list(None, ListOptions::default()).await.expect("list");
    assert_eq!(
        results[0].pending_writes,
        vec![
            PendingWrite::new(task_id, "channel1", json!("somevalue")),
            PendingWrite::new(task_id, "channel2", json!([1, 2, 3])),
            PendingWrite::new(task_id, "channel3", Value::Null),
        ]
    );
}

pub async fn check_pending_sends_from_parent(saver: &dyn CheckpointSaver) {
    let base = CheckpointConfig::thread("thread-sends").with_ns("");
    let mut parent = empty_checkpoint();
    parent.id = "1".to_string();
    let parent_config = saver
        .put(&base, parent, Map::new(), ChannelVersions::new())
        .await
        .expect("put");
    saver
        .put_writes(&parent_config, vec![(TASKS.to_string(), json!("send-from-parent"))], "t1")
        .await
        .expect("put_writes");

    let mut child = empty_checkpoint();
    child.id = "2".to_string();
    let child_config = saver
        .put(&parent_config, child, Map::new(), ChannelVersions::new())
        .await
        .expect("put");
    saver
        .put_writes(&child_config, vec![(TASKS.to_string(), json!("send-from-child"))], "t2")
        .await
        .expect("put_writes");

    // Sends come from the parent's task writes, never the checkpoint's own
    let child = saver.get_tuple(&child_config).await.expect("get").expect("some");
    assert_eq!(child.checkpoint.pending_sends, vec![json!("send-from-parent")]);
    assert_eq!(
        child.pending_writes,
        vec![PendingWrite::new("t2", TASKS, json!("send-from-child"))]
    );

    let parent = saver.get_tuple(&parent_config).await.expect("get").expect("some");
    assert!(parent.checkpoint.pending_sends.is_empty());
    assert_eq!(
        parent.pending_writes,
        vec![PendingWrite::new("t1", TASKS, json!("send-from-parent"))]
    );
}

pub async fn check_existing_blobs_are_kept(saver: &dyn CheckpointSaver) {
    let base = CheckpointConfig::thread("thread-blobs").with_ns("");
    let versions: ChannelVersions = [("channel1".to_string(), "1".to_string())]
        .into_iter()
        .collect();

    for (id, value) in [("1", "first"), ("2", "second")] {
        let mut checkpoint = empty_checkpoint();
        checkpoint.id = id.to_string();
        checkpoint.channel_versions = versions.clone();
        checkpoint.channel_values = object(json!({"channel1": value}));
        saver
            .put(&base, checkpoint, Map::new(), versions.clone())
            .await
            .expect("put");
    }

    // A (channel, version) pair is written once; later values are ignored
    for id in ["1", "2"] {
        let tuple = saver
            .get_tuple(&base.clone().with_checkpoint_id(id))
            .await
            .expect("get")
            .expect("some");
        assert_eq!(tuple.checkpoint.channel_values["channel1"], json!("first"));
    }
}

pub async fn check_regular_writes_keep_first(saver: &dyn CheckpointSaver) {
    let config = CheckpointConfig::thread("thread-first-write")
        .with_ns("")
        .with_checkpoint_id("1");
    let mut checkpoint = empty_checkpoint();
    checkpoint.id = "1".to_string();
    saver
        .put(&config, checkpoint, Map::new(), ChannelVersions::new())
        .await
        .expect("put");

    for value in ["first", "second"] {
        saver
            .put_writes(&config, vec![("channel1".to_string(), json!(value))], "task1")
            .await
            .expect("put_writes");
    }

    let tuple = saver.get_tuple(&config).await.expect("get").expect("some");
    assert_eq!(
        tuple.pending_writes,
        vec![PendingWrite::new("task1", "channel1", json!("first"))]
    );
}

pub async fn check_store_roundtrip(store: &dyn Store) {
    let ns = namespace(["users", "42"]);
    store
        .put(&ns, "profile", object(json!({"name": "Ada", "tags": ["x", "y"]})))
        .await
        .expect("put");

    let item = store.get(&ns, "profile").await.expect("get").expect("some");
    assert_eq!(item.namespace, ns);
    assert_eq!(item.value["name"], json!("Ada"));

    store
        .put(&ns, "profile", object(json!({"name": "Grace"})))
        .await
        .expect("put");
    let updated = store.get(&ns, "profile").await.expect("get").expect("some");
    assert_eq!(updated.value["name"], json!("Grace"));
    assert_eq!(updated.created_at, item.created_at);

    store.delete(&ns, "profile").await.expect("delete");
    assert!(store.get(&ns, "profile").await.expect("get").is_none());
}

pub async fn check_store_search_and_namespaces(store: &dyn Store) {
    store
        .put(&namespace(["docs", "a"]), "1", object(json!({"kind": "note", "n": 1})))
        .await
        .expect("put");
    store
        .put(&namespace(["docs", "b"]), "2", object(json!({"kind": "todo", "n": 2})))
        .await
        .expect("put");
    store
        .put(&namespace(["misc"]), "3", object(json!({"kind": "note"})))
        .await
        .expect("put");

    let docs = store
        .search(&namespace(["docs"]), SearchOptions::default())
        .await
        .expect("search");
    assert_eq!(docs.len(), 2);

    let notes = store
        .search(
            &namespace(["docs"]),
            SearchOptions {
                filter: Some(object(json!({"kind": "note"}))),
                ..Default::default()
            },
        )
        .await
        .expect("search");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].key, "1");

    let everything = store.search(&[], SearchOptions::default()).await.expect("search");
    assert_eq!(everything.len(), 3);

    let namespaces = store
        .list_namespaces(ListNamespacesOptions::default())
        .await
        .expect("list_namespaces");
    assert_eq!(
        namespaces,
        vec![namespace(["docs", "a"]), namespace(["docs", "b"]), namespace(["misc"])]
    );

    let top_level = store
        .list_namespaces(ListNamespacesOptions {
            max_depth: Some(1),
            ..Default::default()
        })
        .await
        .expect("list_namespaces");
    assert_eq!(top_level, vec![namespace(["docs"]), namespace(["misc"])]);
}

pub async fn check_store_search_rejects_bad_prefix(store: &dyn Store) {
    store
        .put(&namespace(["a", "b"]), "1", object(json!({"n": 1})))
        .await
        .expect("put");

    // "a.b" would otherwise match the stored ["a", "b"] namespace
    for prefix in [namespace(["a.b"]), namespace(["a", ""])] {
        assert!(store.search(&prefix, SearchOptions::default()).await.is_err());
    }

    let found = store
        .search(&namespace(["a"]), SearchOptions::default())
        .await
        .expect("search");
    assert_eq!(found.len(), 1);
}
