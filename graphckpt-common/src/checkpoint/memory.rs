//! In-memory checkpoint saver for testing and embedding.

use super::saver::{CheckpointSaver, ListOptions};
use super::{
    special_write_index, write_index, ChannelVersions, Checkpoint, CheckpointMetadata,
    CheckpointTuple, PendingWrite, TASKS,
};
use crate::config::CheckpointConfig;
use crate::filter::matches_filter;
use crate::serializer::{dump_metadata, load_metadata, JsonPlusSerializer, Serializer, EMPTY_TYPE};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// (thread_id, checkpoint_ns, checkpoint_id)
type CheckpointKey = (String, String, String);
/// (thread_id, checkpoint_ns, channel, version)
type BlobKey = (String, String, String, String);
/// (thread_id, checkpoint_ns, checkpoint_id, task_id, idx)
type WriteKey = (String, String, String, String, i64);

struct StoredCheckpoint {
    /// Checkpoint with channel values and pending sends stripped
    checkpoint: Checkpoint,
    /// Metadata as stored text, NUL escapes removed
    metadata: String,
    parent_id: Option<String>,
}

struct StoredWrite {
    channel: String,
    type_tag: String,
    data: Vec<u8>,
}

#[derive(Default)]
struct Tables {
    checkpoints: BTreeMap<CheckpointKey, StoredCheckpoint>,
    blobs: BTreeMap<BlobKey, (String, Option<Vec<u8>>)>,
    writes: BTreeMap<WriteKey, StoredWrite>,
}

/// Checkpoint saver holding everything in process memory
///
/// Mirrors the MySQL saver's table layout so both behave the same way:
/// blobs are keyed by channel version and never overwritten, writes to
/// special channels are upserted and all other writes are insert-if-absent.
pub struct InMemorySaver {
    tables: RwLock<Tables>,
    serde: Arc<dyn Serializer>,
}

impl InMemorySaver {
    pub fn new() -> Self {
        Self::with_serializer(Arc::new(JsonPlusSerializer))
    }

    pub fn with_serializer(serde: Arc<dyn Serializer>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            serde,
        }
    }

    fn load_tuple(
        &self,
        tables: &Tables,
        key: &CheckpointKey,
        stored: &StoredCheckpoint,
    ) -> Result<CheckpointTuple> {
        let (thread_id, ns, checkpoint_id) = key;

        let mut channel_values = Map::new();
        for (channel, version) in &stored.checkpoint.channel_versions {
            let blob_key = (
                thread_id.clone(),
                ns.clone(),
                channel.clone(),
                version.clone(),
            );
            if let Some((type_tag, data)) = tables.blobs.get(&blob_key) {
                if type_tag == EMPTY_TYPE {
                    continue;
                }
                let value = self
                    .serde
                    .loads_typed(type_tag, data.as_deref().unwrap_or_default())?;
                channel_values.insert(channel.clone(), value);
            }
        }

        let mut pending_sends = Vec::new();
        if let Some(parent_id) = &stored.parent_id {
            for ((_, _, _, _, _), write) in writes_for(tables, thread_id, ns, parent_id) {
                if write.channel == TASKS {
                    pending_sends.push(self.serde.loads_typed(&write.type_tag, &write.data)?);
                }
            }
        }

        let mut pending_writes = Vec::new();
        for ((_, _, _, task_id, _), write) in writes_for(tables, thread_id, ns, checkpoint_id) {
            pending_writes.push(PendingWrite::new(
                task_id.clone(),
                write.channel.clone(),
                self.serde.loads_typed(&write.type_tag, &write.data)?,
            ));
        }

        let mut checkpoint = stored.checkpoint.clone();
        checkpoint.channel_values = channel_values;
        checkpoint.pending_sends = pending_sends;

        Ok(CheckpointTuple {
            config: CheckpointConfig {
                thread_id: thread_id.clone(),
                checkpoint_ns: Some(ns.clone()),
                checkpoint_id: Some(checkpoint_id.clone()),
            },
            checkpoint,
            metadata: load_metadata(&stored.metadata)?,
            parent_config: stored.parent_id.as_ref().map(|parent_id| CheckpointConfig {
                thread_id: thread_id.clone(),
                checkpoint_ns: Some(ns.clone()),
                checkpoint_id: Some(parent_id.clone()),
            }),
            pending_writes,
        })
    }
}

impl Default for InMemorySaver {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes of one checkpoint in (task_id, idx) order
fn writes_for<'a>(
    tables: &'a Tables,
    thread_id: &str,
    ns: &str,
    checkpoint_id: &str,
) -> impl Iterator<Item = (&'a WriteKey, &'a StoredWrite)> {
    let start = (
        thread_id.to_string(),
        ns.to_string(),
        checkpoint_id.to_string(),
        String::new(),
        i64::MIN,
    );
    let (thread_id, ns, checkpoint_id) =
        (thread_id.to_string(), ns.to_string(), checkpoint_id.to_string());
    tables
        .writes
        .range(start..)
        .take_while(move |((t, n, c, _, _), _)| *t == thread_id && *n == ns && *c == checkpoint_id)
}

#[async_trait]
impl CheckpointSaver for InMemorySaver {
    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>> {
        let tables = self.tables.read().await;
        let thread_id = config.thread_id.clone();
        let ns = config.ns().to_string();

        let found = match &config.checkpoint_id {
            Some(id) => {
                let key = (thread_id, ns, id.clone());
                tables.checkpoints.get_key_value(&key)
            }
            None => tables
                .checkpoints
                .range((thread_id.clone(), ns.clone(), String::new())..)
                .take_while(|((t, n, _), _)| *t == thread_id && *n == ns)
                .last(),
        };

        match found {
            Some((key, stored)) => Ok(Some(self.load_tuple(&tables, key, stored)?)),
            None => Ok(None),
        }
    }

    async fn list(
        &self,
        config: Option<&CheckpointConfig>,
        options: ListOptions,
    ) -> Result<Vec<CheckpointTuple>> {
        let tables = self.tables.read().await;
        let before_id = options.before_id();

        let mut matching: Vec<(&CheckpointKey, &StoredCheckpoint)> = Vec::new();
        for (key, stored) in &tables.checkpoints {
            let (thread_id, ns, checkpoint_id) = key;
            if let Some(config) = config {
                if *thread_id != config.thread_id {
                    continue;
                }
                if config.checkpoint_ns.as_ref().is_some_and(|want| want != ns) {
                    continue;
                }
                if config.checkpoint_id.as_ref().is_some_and(|want| want != checkpoint_id) {
                    continue;
                }
            }
            if before_id.is_some_and(|before| checkpoint_id.as_str() >= before) {
                continue;
            }
            if options.filter.as_ref().is_some_and(|f| !f.is_empty()) {
                let metadata = load_metadata(&stored.metadata)?;
                if !matches_filter(&metadata, options.filter.as_ref()) {
                    continue;
                }
            }
            matching.push((key, stored));
        }

        matching.sort_by(|(a, _), (b, _)| b.2.cmp(&a.2));
        if let Some(limit) = options.effective_limit() {
            matching.truncate(limit);
        }

        matching
            .into_iter()
            .map(|(key, stored)| self.load_tuple(&tables, key, stored))
            .collect()
    }

    async fn put(
        &self,
        config: &CheckpointConfig,
        mut checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
        new_versions: ChannelVersions,
    ) -> Result<CheckpointConfig> {
        let thread_id = config.thread_id.clone();
        let ns = config.ns().to_string();
        let values = std::mem::take(&mut checkpoint.channel_values);
        checkpoint.pending_sends.clear();

        let mut blobs = Vec::with_capacity(new_versions.len());
        for (channel, version) in new_versions {
            let blob = match values.get(&channel) {
                Some(value) => {
                    let (type_tag, data) = self.serde.dumps_typed(value)?;
                    (type_tag, Some(data))
                }
                None => (EMPTY_TYPE.to_string(), None),
            };
            blobs.push(((thread_id.clone(), ns.clone(), channel, version), blob));
        }
        let metadata = dump_metadata(&metadata)?;

        let checkpoint_id = checkpoint.id.clone();
        let mut tables = self.tables.write().await;
        for (key, blob) in blobs {
            tables.blobs.entry(key).or_insert(blob);
        }
        tables.checkpoints.insert(
            (thread_id.clone(), ns.clone(), checkpoint_id.clone()),
            StoredCheckpoint {
                checkpoint,
                metadata,
                parent_id: config.checkpoint_id.clone(),
            },
        );
        debug!(%thread_id, %ns, %checkpoint_id, "stored checkpoint");

        Ok(CheckpointConfig {
            thread_id,
            checkpoint_ns: Some(ns),
            checkpoint_id: Some(checkpoint_id),
        })
    }

    async fn put_writes(
        &self,
        config: &CheckpointConfig,
        writes: Vec<(String, Value)>,
        task_id: &str,
    ) -> Result<()> {
        let checkpoint_id = config.checkpoint_id.clone().ok_or_else(|| {
            Error::InvalidInput("put_writes requires a checkpoint_id in the config".to_string())
        })?;
        let upsert = writes
            .iter()
            .all(|(channel, _)| special_write_index(channel).is_some());

        let mut rows = Vec::with_capacity(writes.len());
        for (position, (channel, value)) in writes.into_iter().enumerate() {
            let (type_tag, data) = self.serde.dumps_typed(&value)?;
            let key = (
                config.thread_id.clone(),
                config.ns().to_string(),
                checkpoint_id.clone(),
                task_id.to_string(),
                write_index(&channel, position),
            );
            rows.push((key, StoredWrite { channel, type_tag, data }));
        }

        let mut tables = self.tables.write().await;
        for (key, write) in rows {
            if upsert {
                tables.writes.insert(key, write);
            } else {
                tables.writes.entry(key).or_insert(write);
            }
        }
        Ok(())
    }
}
