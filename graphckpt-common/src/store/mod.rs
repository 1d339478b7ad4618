//! Key/value document store
//!
//! Documents are JSON objects addressed by a hierarchical namespace plus a
//! key. Namespaces are lists of labels, e.g. `["users", "42", "memories"]`.

mod memory;

pub use memory::InMemoryStore;

use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Namespace = Vec<String>;

/// Label that matches any single label in namespace prefix/suffix conditions
pub const WILDCARD: &str = "*";

/// Separator used when a namespace is flattened into one string
pub const NAMESPACE_SEPARATOR: &str = ".";

/// Build a namespace from string-like labels
pub fn namespace<I, S>(labels: I) -> Namespace
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    labels.into_iter().map(Into::into).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub namespace: Namespace,
    pub key: String,
    pub value: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Keep items whose value contains every entry
    pub filter: Option<Map<String, Value>>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            filter: None,
            limit: 10,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListNamespacesOptions {
    /// Namespaces must start with these labels (`*` matches any label)
    pub prefix: Option<Namespace>,
    /// Namespaces must end with these labels (`*` matches any label)
    pub suffix: Option<Namespace>,
    /// Truncate namespaces to this many labels before deduplicating
    pub max_depth: Option<usize>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for ListNamespacesOptions {
    fn default() -> Self {
        Self {
            prefix: None,
            suffix: None,
            max_depth: None,
            limit: 100,
            offset: 0,
        }
    }
}

/// Persistence backend for namespaced documents
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, namespace: &[String], key: &str) -> Result<Option<Item>>;

    /// Insert or replace a document; `created_at` survives replacement
    async fn put(&self, namespace: &[String], key: &str, value: Map<String, Value>) -> Result<()>;

    /// Remove a document; removing a missing document is not an error
    async fn delete(&self, namespace: &[String], key: &str) -> Result<()>;

    /// Documents under `namespace_prefix`, most recently updated first
    async fn search(&self, namespace_prefix: &[String], options: SearchOptions) -> Result<Vec<Item>>;

    async fn list_namespaces(&self, options: ListNamespacesOptions) -> Result<Vec<Namespace>>;
}

/// Reject namespaces that cannot be flattened and split back unambiguously
pub fn validate_namespace(namespace: &[String]) -> Result<()> {
    if namespace.is_empty() {
        return Err(Error::InvalidInput("namespace cannot be empty".to_string()));
    }
    for label in namespace {
        if label.is_empty() {
            return Err(Error::InvalidInput(format!(
                "namespace labels cannot be empty: {:?}",
                namespace
            )));
        }
        if label.contains(NAMESPACE_SEPARATOR) {
            return Err(Error::InvalidInput(format!(
                "namespace labels cannot contain '{}': {:?}",
                NAMESPACE_SEPARATOR, namespace
            )));
        }
    }
    Ok(())
}

pub fn join_namespace(namespace: &[String]) -> String {
    namespace.join(NAMESPACE_SEPARATOR)
}

pub fn split_namespace(prefix: &str) -> Namespace {
    prefix.split(NAMESPACE_SEPARATOR).map(str::to_string).collect()
}

fn labels_match(labels: &[String], pattern: &[String]) -> bool {
    labels.len() == pattern.len()
        && labels
            .iter()
            .zip(pattern)
            .all(|(label, want)| want == WILDCARD || label == want)
}

fn namespace_matches(namespace: &[String], options: &ListNamespacesOptions) -> bool {
    if let Some(prefix) = &options.prefix {
        if namespace.len() < prefix.len() || !labels_match(&namespace[..prefix.len()], prefix) {
            return false;
        }
    }
    if let Some(suffix) = &options.suffix {
        if namespace.len() < suffix.len()
            || !labels_match(&namespace[namespace.len() - suffix.len()..], suffix)
        {
            return false;
        }
    }
    true
}

/// Apply prefix/suffix matching, depth truncation and paging
///
/// Shared by every backend so namespace listing behaves identically.
pub fn select_namespaces<I>(namespaces: I, options: &ListNamespacesOptions) -> Vec<Namespace>
where
    I: IntoIterator<Item = Namespace>,
{
    let mut selected: Vec<Namespace> = namespaces
        .into_iter()
        .filter(|ns| namespace_matches(ns, options))
        .map(|mut ns| {
            if let Some(depth) = options.max_depth {
                ns.truncate(depth);
            }
            ns
        })
        .collect();
    selected.sort();
    selected.dedup();
    selected
        .into_iter()
        .skip(options.offset)
        .take(options.limit)
        .collect()
}
