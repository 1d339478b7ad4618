//! SQL for the checkpoint saver
//!
//! `SELECT_SQL` returns one row per checkpoint with three JSON aggregates
//! attached: the blobs of the channel versions the checkpoint references, the
//! checkpoint's own pending writes, and the TASKS writes of its parent
//! (pending sends). Binary columns inside JSON come back as
//! `"base64:typeNNN:<data>"` strings; see the codec module.

use graphckpt_common::checkpoint::{CheckpointMetadata, TASKS};
use graphckpt_common::CheckpointConfig;
use graphckpt_common::Result;
use once_cell::sync::Lazy;

pub static SELECT_SQL: Lazy<String> = Lazy::new(|| {
    format!(
        r#"
select
    thread_id,
    checkpoint,
    checkpoint_ns,
    checkpoint_id,
    parent_checkpoint_id,
    metadata,
    (
        select json_arrayagg(json_array(bl.channel, bl.type, bl.blob))
        from
        (
            select channel, json_unquote(
                json_extract(checkpoint, concat('$.channel_versions."', channel, '"'))
            ) as version
            from json_table(
                json_keys(checkpoint, '$.channel_versions'),
                '$[*]' columns (channel VARCHAR(150) PATH '$')
            ) as channels
        ) as channel_versions
        inner join checkpoint_blobs bl
            on bl.thread_id = checkpoints.thread_id
            and bl.checkpoint_ns = checkpoints.checkpoint_ns
            and bl.channel = channel_versions.channel
            and bl.version = channel_versions.version
    ) as channel_values,
    (
        select
        json_arrayagg(json_array(cw.task_id, cw.channel, cw.type, cw.blob, cw.idx))
        from checkpoint_writes cw
        where cw.thread_id = checkpoints.thread_id
            and cw.checkpoint_ns = checkpoints.checkpoint_ns
            and cw.checkpoint_id = checkpoints.checkpoint_id
    ) as pending_writes,
    (
        select json_arrayagg(json_array(cw.task_id, cw.type, cw.blob, cw.idx))
        from checkpoint_writes cw
        where cw.thread_id = checkpoints.thread_id
            and cw.checkpoint_ns = checkpoints.checkpoint_ns
            and cw.checkpoint_id = checkpoints.parent_checkpoint_id
            and cw.channel = '{TASKS}'
    ) as pending_sends
from checkpoints "#
    )
});

pub const UPSERT_CHECKPOINT_BLOBS_SQL: &str = r#"
    INSERT IGNORE INTO checkpoint_blobs (thread_id, checkpoint_ns, channel, version, type, `blob`)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

pub const UPSERT_CHECKPOINTS_SQL: &str = r#"
    INSERT INTO checkpoints (thread_id, checkpoint_ns, checkpoint_id, parent_checkpoint_id, checkpoint, metadata)
    VALUES (?, ?, ?, ?, ?, ?) AS new
    ON DUPLICATE KEY UPDATE
        checkpoint = new.checkpoint,
        metadata = new.metadata
"#;

pub const UPSERT_CHECKPOINT_WRITES_SQL: &str = r#"
    INSERT INTO checkpoint_writes (thread_id, checkpoint_ns, checkpoint_id, task_id, idx, channel, type, `blob`)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?) AS new
    ON DUPLICATE KEY UPDATE
        channel = new.channel,
        type = new.type,
        `blob` = new.blob
"#;

pub const INSERT_CHECKPOINT_WRITES_SQL: &str = r#"
    INSERT IGNORE INTO checkpoint_writes (thread_id, checkpoint_ns, checkpoint_id, task_id, idx, channel, type, `blob`)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

/// WHERE clause and its bind values for `list`
///
/// Returns an empty string when nothing narrows the query. Values are in
/// placeholder order.
pub fn search_where(
    config: Option<&CheckpointConfig>,
    filter: Option<&CheckpointMetadata>,
    before_id: Option<&str>,
) -> Result<(String, Vec<String>)> {
    let mut wheres = Vec::new();
    let mut params = Vec::new();

    if let Some(config) = config {
        wheres.push("thread_id = ?");
        params.push(config.thread_id.clone());

        if let Some(ns) = &config.checkpoint_ns {
            wheres.push("checkpoint_ns = ?");
            params.push(ns.clone());
        }

        if let Some(checkpoint_id) = &config.checkpoint_id {
            wheres.push("checkpoint_id = ?");
            params.push(checkpoint_id.clone());
        }
    }

    if let Some(filter) = filter.filter(|f| !f.is_empty()) {
        wheres.push("json_contains(metadata, ?)");
        params.push(serde_json::to_string(filter)?);
    }

    if let Some(before_id) = before_id {
        wheres.push("checkpoint_id < ?");
        params.push(before_id.to_string());
    }

    let clause = if wheres.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", wheres.join(" AND "))
    };
    Ok((clause, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_where_empty() {
        let (clause, params) = search_where(None, None, None).unwrap();
        assert_eq!(clause, "");
        assert!(params.is_empty());
    }

    #[test]
    fn test_search_where_thread_only_spans_namespaces() {
        let config = CheckpointConfig::thread("thread-2");
        let (clause, params) = search_where(Some(&config), None, None).unwrap();
        assert_eq!(clause, "WHERE thread_id = ?");
        assert_eq!(params, vec!["thread-2"]);
    }

    #[test]
    fn test_search_where_all_predicates() {
        let config = CheckpointConfig::thread("t")
            .with_ns("inner")
            .with_checkpoint_id("c");
        let filter = json!({"source": "input"}).as_object().cloned().unwrap();

        let (clause, params) = search_where(Some(&config), Some(&filter), Some("b")).unwrap();
        assert_eq!(
            clause,
            "WHERE thread_id = ? AND checkpoint_ns = ? AND checkpoint_id = ? \
             AND json_contains(metadata, ?) AND checkpoint_id < ?"
        );
        assert_eq!(params, vec!["t", "inner", "c", r#"{"source":"input"}"#, "b"]);
    }

    #[test]
    fn test_search_where_ignores_empty_filter() {
        let (clause, _) = search_where(None, Some(&CheckpointMetadata::new()), None).unwrap();
        assert_eq!(clause, "");
    }

    #[test]
    fn test_select_reads_parent_tasks_channel() {
        assert!(SELECT_SQL.contains("cw.channel = '__pregel_tasks'"));
    }
}
