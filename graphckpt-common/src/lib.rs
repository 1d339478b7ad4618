//! # graphckpt common library
//!
//! Shared code for the graphckpt persistence crates:
//! - Checkpoint data model and version helpers
//! - Typed value serializer
//! - `CheckpointSaver` and `Store` traits
//! - In-memory backends for both traits
//! - Error type

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod filter;
pub mod serializer;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use checkpoint::{
    create_checkpoint, empty_checkpoint, next_version, ChannelVersions, Checkpoint,
    CheckpointMetadata, CheckpointSaver, CheckpointTuple, InMemorySaver, ListOptions,
    PendingWrite,
};
pub use config::CheckpointConfig;
pub use error::{Error, Result};
pub use serializer::{JsonPlusSerializer, Serializer};
pub use store::{InMemoryStore, Item, ListNamespacesOptions, SearchOptions, Store};
