//! Checkpoint addressing
//!
//! A [`CheckpointConfig`] names a thread, optionally a namespace within it and
//! optionally one checkpoint. It is what callers pass in and what `put`
//! hands back.

use serde::{Deserialize, Serialize};

/// Identifies a thread, namespace and (optionally) a checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub thread_id: String,

    /// Namespace within the thread. `None` reads and writes the root
    /// namespace `""`, and lists across every namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_ns: Option<String>,

    /// Older callers send this as `thread_ts`
    #[serde(default, alias = "thread_ts", skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<String>,
}

impl CheckpointConfig {
    /// Config for the latest checkpoint of a thread
    pub fn thread(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            checkpoint_ns: None,
            checkpoint_id: None,
        }
    }

    pub fn with_ns(mut self, checkpoint_ns: impl Into<String>) -> Self {
        self.checkpoint_ns = Some(checkpoint_ns.into());
        self
    }

    pub fn with_checkpoint_id(mut self, checkpoint_id: impl Into<String>) -> Self {
        self.checkpoint_id = Some(checkpoint_id.into());
        self
    }

    /// Namespace to read from or write to; the root namespace when unset
    pub fn ns(&self) -> &str {
        self.checkpoint_ns.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_ts_alias() {
        let config: CheckpointConfig = serde_json::from_str(
            r#"{"thread_id": "thread-1", "thread_ts": "1", "checkpoint_ns": ""}"#,
        )
        .unwrap();

        assert_eq!(config.checkpoint_id.as_deref(), Some("1"));
        assert_eq!(config.ns(), "");
    }

    #[test]
    fn test_ns_defaults_to_root() {
        let config = CheckpointConfig::thread("t");
        assert_eq!(config.ns(), "");
        assert!(config.checkpoint_ns.is_none());

        let config = config.with_ns("inner").with_checkpoint_id("2-inner");
        assert_eq!(config.ns(), "inner");
        assert_eq!(config.checkpoint_id.as_deref(), Some("2-inner"));
    }
}
