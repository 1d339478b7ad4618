//! Checkpoint saver trait

use super::{next_version, ChannelVersions, Checkpoint, CheckpointMetadata, CheckpointTuple};
use crate::config::CheckpointConfig;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Narrowing options for [`CheckpointSaver::list`]
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Keep checkpoints whose metadata contains every entry
    pub filter: Option<CheckpointMetadata>,
    /// Keep checkpoints with an id strictly below this config's checkpoint id
    pub before: Option<CheckpointConfig>,
    /// Maximum number of checkpoints to return; `Some(0)` means no limit
    pub limit: Option<usize>,
}

impl ListOptions {
    pub fn filter(mut self, filter: CheckpointMetadata) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn before(mut self, before: CheckpointConfig) -> Self {
        self.before = Some(before);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Effective limit, with `Some(0)` treated as unbounded
    pub fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|limit| *limit > 0)
    }

    /// Checkpoint id bound from `before`, if it names one
    pub fn before_id(&self) -> Option<&str> {
        self.before.as_ref().and_then(|b| b.checkpoint_id.as_deref())
    }
}

/// Persistence backend for checkpoints and pending writes
#[async_trait]
pub trait CheckpointSaver: Send + Sync {
    /// Fetch one checkpoint tuple
    ///
    /// With a `checkpoint_id` in `config` that exact checkpoint is returned,
    /// otherwise the newest checkpoint of the thread's namespace.
    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>>;

    /// List checkpoints, newest first
    ///
    /// `None` lists every thread. A config narrows by thread, by namespace
    /// only when one is set, and by checkpoint id when one is set.
    async fn list(
        &self,
        config: Option<&CheckpointConfig>,
        options: ListOptions,
    ) -> Result<Vec<CheckpointTuple>>;

    /// Store a checkpoint and the blobs of the channels in `new_versions`
    ///
    /// The checkpoint id in `config`, if any, becomes the parent id. Returns
    /// the config addressing the stored checkpoint.
    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
        new_versions: ChannelVersions,
    ) -> Result<CheckpointConfig>;

    /// Store intermediate writes of `task_id` against the checkpoint in `config`
    async fn put_writes(
        &self,
        config: &CheckpointConfig,
        writes: Vec<(String, Value)>,
        task_id: &str,
    ) -> Result<()>;

    async fn get(&self, config: &CheckpointConfig) -> Result<Option<Checkpoint>> {
        Ok(self.get_tuple(config).await?.map(|t| t.checkpoint))
    }

    /// Version following `current`; see [`next_version`]
    fn get_next_version(&self, current: Option<&str>) -> Result<String> {
        next_version(current)
    }
}
