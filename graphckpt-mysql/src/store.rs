//! MySQL document store
//!
//! Namespaces are stored joined with `.` in the `prefix` column, so a prefix
//! search is an equality match on the namespace itself plus a `LIKE` match on
//! everything nested below it.

use crate::config::connect;
use crate::migrations::{run_migrations, STORE_MIGRATIONS, STORE_MIGRATIONS_TABLE};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use graphckpt_common::store::{
    join_namespace, select_namespaces, split_namespace, validate_namespace, Namespace,
    NAMESPACE_SEPARATOR,
};
use graphckpt_common::{Error, Item, ListNamespacesOptions, Result, SearchOptions, Store};
use serde_json::{Map, Value};
use sqlx::mysql::MySqlRow;
use sqlx::types::Json;
use sqlx::{MySqlPool, Row};
use tracing::debug;

const SELECT_ITEM_SQL: &str =
    "SELECT prefix, `key`, value, created_at, updated_at FROM store";

const UPSERT_ITEM_SQL: &str = r#"
    INSERT INTO store (prefix, `key`, value) VALUES (?, ?, ?) AS new
    ON DUPLICATE KEY UPDATE
        value = new.value,
        updated_at = CURRENT_TIMESTAMP(6)
"#;

/// Document store backed by a MySQL pool
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn from_conn_string(conn_string: &str) -> Result<Self> {
        Ok(Self::from_pool(connect(conn_string).await?))
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Create or upgrade the store table
    pub async fn setup(&self) -> Result<()> {
        run_migrations(&self.pool, STORE_MIGRATIONS_TABLE, STORE_MIGRATIONS).await
    }
}

fn row_to_item(row: &MySqlRow) -> Result<Item> {
    let prefix: String = row.try_get("prefix")?;
    let key: String = row.try_get("key")?;
    let Json(value): Json<Value> = row.try_get("value")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    let value = match value {
        Value::Object(map) => map,
        other => return Err(Error::Corrupt(format!("Store value is not an object: {}", other))),
    };

    Ok(Item {
        namespace: split_namespace(&prefix),
        key,
        value,
        created_at,
        updated_at,
    })
}

/// `LIKE` pattern matching every namespace nested below `prefix`
fn nested_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 2);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push_str(NAMESPACE_SEPARATOR);
    pattern.push('%');
    pattern
}

#[async_trait]
impl Store for MySqlStore {
    async fn get(&self, namespace: &[String], key: &str) -> Result<Option<Item>> {
        validate_namespace(namespace)?;
        let sql = format!("{} WHERE prefix = ? AND `key` = ?", SELECT_ITEM_SQL);
        let row = sqlx::query(&sql)
            .bind(join_namespace(namespace))
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_item).transpose()
    }

    async fn put(&self, namespace: &[String], key: &str, value: Map<String, Value>) -> Result<()> {
        validate_namespace(namespace)?;
        let prefix = join_namespace(namespace);
        sqlx::query(UPSERT_ITEM_SQL)
            .bind(&prefix)
            .bind(key)
            .bind(Json(&value))
            .execute(&self.pool)
            .await?;
        debug!(%prefix, key, "stored item");
        Ok(())
    }

    async fn delete(&self, namespace: &[String], key: &str) -> Result<()> {
        validate_namespace(namespace)?;
        sqlx::query("DELETE FROM store WHERE prefix = ? AND `key` = ?")
            .bind(join_namespace(namespace))
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn search(&self, namespace_prefix: &[String], options: SearchOptions) -> Result<Vec<Item>> {
        let mut wheres = Vec::new();
        let mut params = Vec::new();

        if !namespace_prefix.is_empty() {
            validate_namespace(namespace_prefix)?;
            let prefix = join_namespace(namespace_prefix);
            wheres.push("(prefix = ? OR prefix LIKE ?)");
            let pattern = nested_pattern(&prefix);
            params.push(prefix);
            params.push(pattern);
        }

        if let Some(filter) = options.filter.as_ref().filter(|f| !f.is_empty()) {
            wheres.push("json_contains(value, ?)");
            params.push(serde_json::to_string(filter)?);
        }

        let where_clause = if wheres.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", wheres.join(" AND "))
        };
        let sql = format!(
            "{} {} ORDER BY updated_at DESC LIMIT ? OFFSET ?",
            SELECT_ITEM_SQL, where_clause
        );

        let mut query = sqlx::query(&sql);
        for param in &params {
            query = query.bind(param);
        }
        let rows = query
            .bind(options.limit as u64)
            .bind(options.offset as u64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_item).collect()
    }

    async fn list_namespaces(&self, options: ListNamespacesOptions) -> Result<Vec<Namespace>> {
        let prefixes: Vec<String> = sqlx::query_scalar("SELECT DISTINCT prefix FROM store")
            .fetch_all(&self.pool)
            .await?;
        Ok(select_namespaces(
            prefixes.iter().map(|p| split_namespace(p)),
            &options,
        ))
    }
}
