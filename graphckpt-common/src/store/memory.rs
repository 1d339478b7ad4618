//! In-memory document store for testing.

use super::{select_namespaces, validate_namespace, Item, ListNamespacesOptions, Namespace, SearchOptions, Store};
use crate::filter::matches_filter;
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Document store backed by a map
///
/// Does not persist anything between runs.
#[derive(Default)]
pub struct InMemoryStore {
    items: RwLock<BTreeMap<(Namespace, String), Item>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get(&self, namespace: &[String], key: &str) -> Result<Option<Item>> {
        validate_namespace(namespace)?;
        let items = self.items.read().await;
        Ok(items.get(&(namespace.to_vec(), key.to_string())).cloned())
    }

    async fn put(&self, namespace: &[String], key: &str, value: Map<String, Value>) -> Result<()> {
        validate_namespace(namespace)?;
        let now = Utc::now();
        let mut items = self.items.write().await;
        let created_at = items
            .get(&(namespace.to_vec(), key.to_string()))
            .map(|existing| existing.created_at)
            .unwrap_or(now);
        items.insert(
            (namespace.to_vec(), key.to_string()),
            Item {
                namespace: namespace.to_vec(),
                key: key.to_string(),
                value,
                created_at,
                updated_at: now,
            },
        );
        Ok(())
    }

    async fn delete(&self, namespace: &[String], key: &str) -> Result<()> {
        validate_namespace(namespace)?;
        let mut items = self.items.write().await;
        items.remove(&(namespace.to_vec(), key.to_string()));
        Ok(())
    }

    async fn search(&self, namespace_prefix: &[String], options: SearchOptions) -> Result<Vec<Item>> {
        if !namespace_prefix.is_empty() {
            validate_namespace(namespace_prefix)?;
        }
        let items = self.items.read().await;
        let mut found: Vec<&Item> = items
            .values()
            .filter(|item| item.namespace.starts_with(namespace_prefix))
            .filter(|item| matches_filter(&item.value, options.filter.as_ref()))
            .collect();
        found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(found
            .into_iter()
            .skip(options.offset)
            .take(options.limit)
            .cloned()
            .collect())
    }

    async fn list_namespaces(&self, options: ListNamespacesOptions) -> Result<Vec<Namespace>> {
        let items = self.items.read().await;
        let namespaces = items.keys().map(|(ns, _)| ns.clone());
        Ok(select_namespaces(namespaces, &options))
    }
}
