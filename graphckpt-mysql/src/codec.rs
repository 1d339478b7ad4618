//! Decoding of the JSON aggregates returned by `SELECT_SQL`
//!
//! MySQL renders binary values inside JSON as `"base64:type<N>:<data>"`,
//! where N is the column type code (251 for LONGBLOB). NULL blobs come back
//! as JSON null.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use graphckpt_common::{Error, Result};
use serde_json::Value;

const BASE64_PREFIX: &str = "base64:";

pub(crate) struct ChannelBlob {
    pub channel: String,
    pub type_tag: String,
    pub data: Option<Vec<u8>>,
}

pub(crate) struct WriteRow {
    pub task_id: String,
    pub channel: String,
    pub type_tag: String,
    pub data: Vec<u8>,
    pub idx: i64,
}

pub(crate) struct SendRow {
    pub task_id: String,
    pub type_tag: String,
    pub data: Vec<u8>,
    pub idx: i64,
}

/// Bytes of a blob embedded in JSON
pub(crate) fn decode_blob(value: &Value) -> Result<Option<Vec<u8>>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.starts_with(BASE64_PREFIX) => {
            let encoded = s.rsplit(':').next().unwrap_or_default();
            let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
            STANDARD
                .decode(cleaned)
                .map(Some)
                .map_err(|e| Error::Corrupt(format!("Invalid base64 blob: {}", e)))
        }
        Value::String(s) => Ok(Some(s.as_bytes().to_vec())),
        other => Err(Error::Corrupt(format!("Unexpected blob value: {}", other))),
    }
}

fn rows(aggregate: Option<Value>, expected_len: usize, what: &str) -> Result<Vec<Vec<Value>>> {
    let items = match aggregate {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(Error::Corrupt(format!("{} is not a JSON array: {}", what, other)))
        }
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Array(fields) if fields.len() == expected_len => Ok(fields),
            other => Err(Error::Corrupt(format!("Malformed {} entry: {}", what, other))),
        })
        .collect()
}

fn string_field(value: &Value, what: &str) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::Corrupt(format!("Expected string for {}, got {}", what, value)))
}

fn int_field(value: &Value, what: &str) -> Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| Error::Corrupt(format!("Expected integer for {}, got {}", what, value)))
}

/// `[[channel, type, blob], ...]`
pub(crate) fn channel_blobs(aggregate: Option<Value>) -> Result<Vec<ChannelBlob>> {
    rows(aggregate, 3, "channel_values")?
        .into_iter()
        .map(|fields| {
            Ok(ChannelBlob {
                channel: string_field(&fields[0], "channel")?,
                type_tag: string_field(&fields[1], "type")?,
                data: decode_blob(&fields[2])?,
            })
        })
        .collect()
}

/// `[[task_id, channel, type, blob, idx], ...]`, sorted by (task_id, idx)
pub(crate) fn pending_writes(aggregate: Option<Value>) -> Result<Vec<WriteRow>> {
    let mut writes = rows(aggregate, 5, "pending_writes")?
        .into_iter()
        .map(|fields| {
            Ok(WriteRow {
                task_id: string_field(&fields[0], "task_id")?,
                channel: string_field(&fields[1], "channel")?,
                type_tag: string_field(&fields[2], "type")?,
                data: decode_blob(&fields[3])?.unwrap_or_default(),
                idx: int_field(&fields[4], "idx")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    writes.sort_by(|a, b| (&a.task_id, a.idx).cmp(&(&b.task_id, b.idx)));
    Ok(writes)
}

/// `[[task_id, type, blob, idx], ...]`, sorted by (task_id, idx)
pub(crate) fn pending_sends(aggregate: Option<Value>) -> Result<Vec<SendRow>> {
    let mut sends = rows(aggregate, 4, "pending_sends")?
        .into_iter()
        .map(|fields| {
            Ok(SendRow {
                task_id: string_field(&fields[0], "task_id")?,
                type_tag: string_field(&fields[1], "type")?,
                data: decode_blob(&fields[2])?.unwrap_or_default(),
                idx: int_field(&fields[3], "idx")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    sends.sort_by(|a, b| (&a.task_id, a.idx).cmp(&(&b.task_id, b.idx)));
    Ok(sends)
}
