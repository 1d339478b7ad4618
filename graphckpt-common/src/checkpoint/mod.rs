//! Checkpoint data model
//!
//! A checkpoint is a snapshot of every channel of a graph at one step. Channel
//! values are not stored inline: each (channel, version) pair is a separate
//! blob, and a checkpoint only records which version of each channel it saw.

mod memory;
mod saver;

pub use memory::InMemorySaver;
pub use saver::{CheckpointSaver, ListOptions};

use crate::config::CheckpointConfig;
use crate::{Error, Result};
use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Builder;

/// Current checkpoint format version
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

/// Channel carrying task sends; surfaces as `pending_sends` on the child checkpoint
pub const TASKS: &str = "__pregel_tasks";
pub const ERROR: &str = "__error__";
pub const SCHEDULED: &str = "__scheduled__";
pub const INTERRUPT: &str = "__interrupt__";
pub const RESUME: &str = "__resume__";

/// Channel name -> version string
pub type ChannelVersions = BTreeMap<String, String>;

/// Free-form metadata stored next to a checkpoint
pub type CheckpointMetadata = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Format version
    pub v: u32,
    /// Time-ordered id; lexical order is creation order
    pub id: String,
    /// RFC 3339 creation timestamp
    pub ts: String,
    #[serde(default)]
    pub channel_values: Map<String, Value>,
    #[serde(default)]
    pub channel_versions: ChannelVersions,
    /// Node name -> channel versions that node has consumed
    #[serde(default)]
    pub versions_seen: BTreeMap<String, ChannelVersions>,
    #[serde(default)]
    pub pending_sends: Vec<Value>,
}

/// A write produced by a task before the next checkpoint was taken
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingWrite {
    pub task_id: String,
    pub channel: String,
    pub value: Value,
}

impl PendingWrite {
    pub fn new(task_id: impl Into<String>, channel: impl Into<String>, value: Value) -> Self {
        Self {
            task_id: task_id.into(),
            channel: channel.into(),
            value,
        }
    }
}

/// A checkpoint together with everything needed to resume from it
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointTuple {
    pub config: CheckpointConfig,
    pub checkpoint: Checkpoint,
    pub metadata: CheckpointMetadata,
    pub parent_config: Option<CheckpointConfig>,
    pub pending_writes: Vec<PendingWrite>,
}

/// Largest step that fits the 12-bit counter of a v7 id
const MAX_ID_STEP: i64 = 0xFFF;

/// UUIDv7 whose counter bits hold `step`
///
/// Ids created in the same millisecond still sort by step. Steps outside
/// `0..=4095` are clamped.
fn new_checkpoint_id(step: i64) -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let counter = step.clamp(0, MAX_ID_STEP) as u16;
    let mut bytes: [u8; 10] = rand::thread_rng().gen();
    bytes[0] = (counter >> 8) as u8;
    bytes[1] = counter as u8;
    Builder::from_unix_timestamp_millis(millis, &bytes)
        .into_uuid()
        .to_string()
}

fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Checkpoint with no channels
pub fn empty_checkpoint() -> Checkpoint {
    Checkpoint {
        v: CHECKPOINT_FORMAT_VERSION,
        id: new_checkpoint_id(0),
        ts: now_ts(),
        channel_values: Map::new(),
        channel_versions: ChannelVersions::new(),
        versions_seen: BTreeMap::new(),
        pending_sends: Vec::new(),
    }
}

/// Successor of `previous` holding `channel_values`
///
/// Versions are carried over unchanged. Without an explicit `id` the new id
/// carries `step` in its counter bits.
pub fn create_checkpoint(
    previous: &Checkpoint,
    channel_values: Map<String, Value>,
    step: i64,
    id: Option<String>,
) -> Checkpoint {
    Checkpoint {
        v: CHECKPOINT_FORMAT_VERSION,
        id: id.unwrap_or_else(|| new_checkpoint_id(step)),
        ts: now_ts(),
        channel_values,
        channel_versions: previous.channel_versions.clone(),
        versions_seen: previous.versions_seen.clone(),
        pending_sends: Vec::new(),
    }
}

/// Next version string for a channel
///
/// The integer part before the first `.` is incremented; the fractional part
/// is random so concurrent writers rarely produce the same string. A version
/// whose integer part is missing or does not fit a `u128` is rejected rather
/// than restarted, so versions never move backwards.
pub fn next_version(current: Option<&str>) -> Result<String> {
    let current_v: u128 = match current {
        None => 0,
        Some(version) => {
            let int_part = version.split('.').next().unwrap_or_default();
            int_part.parse().map_err(|e| {
                Error::InvalidInput(format!("Invalid channel version {:?}: {}", version, e))
            })?
        }
    };
    let next_v = current_v.checked_add(1).ok_or_else(|| {
        Error::InvalidInput(format!("Channel version {} cannot be incremented", current_v))
    })?;
    let next_h: f64 = rand::thread_rng().gen();
    Ok(format!("{:032}.{:016}", next_v, next_h))
}

/// Fixed index for writes to special channels, else the write's position
pub fn write_index(channel: &str, position: usize) -> i64 {
    special_write_index(channel).unwrap_or(position as i64)
}

/// Index reserved for a special channel, if `channel` is one
pub fn special_write_index(channel: &str) -> Option<i64> {
    match channel {
        ERROR => Some(-1),
        SCHEDULED => Some(-2),
        INTERRUPT => Some(-3),
        RESUME => Some(-4),
        _ => None,
    }
}
