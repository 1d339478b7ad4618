//! Database schema migrations
//!
//! Each migration set is an ordered list of statements; a statement's
//! position in the list is its version number. The highest applied version is
//! tracked in a dedicated table (`checkpoint_migrations`, `store_migrations`)
//! that is itself created by migration 0.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - databases that already applied
//!    them will not run them again
//! 2. **Always append** - add a new statement at the end of the list
//! 3. **One statement per entry** - statements run outside a transaction, so a
//!    failed entry leaves the version unrecorded and is retried next time

use graphckpt_common::Result;
use sqlx::MySqlPool;
use tracing::{debug, info, warn};

/// SQLSTATE for "table doesn't exist" (MySQL error 1146)
const NO_SUCH_TABLE: &str = "42S02";

pub const CHECKPOINT_MIGRATIONS_TABLE: &str = "checkpoint_migrations";

pub const CHECKPOINT_MIGRATIONS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS checkpoint_migrations (
    v INTEGER PRIMARY KEY
)"#,
    r#"CREATE TABLE IF NOT EXISTS checkpoints (
    thread_id VARCHAR(150) NOT NULL,
    checkpoint_ns VARCHAR(150) NOT NULL DEFAULT '',
    checkpoint_id VARCHAR(150) NOT NULL,
    parent_checkpoint_id VARCHAR(150),
    type VARCHAR(150),
    checkpoint JSON NOT NULL,
    metadata JSON NOT NULL DEFAULT ('{}'),
    PRIMARY KEY (thread_id, checkpoint_ns, checkpoint_id)
)"#,
    r#"CREATE TABLE IF NOT EXISTS checkpoint_blobs (
    thread_id VARCHAR(150) NOT NULL,
    checkpoint_ns VARCHAR(150) NOT NULL DEFAULT '',
    channel VARCHAR(150) NOT NULL,
    version VARCHAR(150) NOT NULL,
    type VARCHAR(150) NOT NULL,
    `blob` LONGBLOB,
    PRIMARY KEY (thread_id, checkpoint_ns, channel, version)
)"#,
    r#"CREATE TABLE IF NOT EXISTS checkpoint_writes (
    thread_id VARCHAR(150) NOT NULL,
    checkpoint_ns VARCHAR(150) NOT NULL DEFAULT '',
    checkpoint_id VARCHAR(150) NOT NULL,
    task_id VARCHAR(150) NOT NULL,
    idx INTEGER NOT NULL,
    channel VARCHAR(150) NOT NULL,
    type VARCHAR(150),
    `blob` LONGBLOB NOT NULL,
    PRIMARY KEY (thread_id, checkpoint_ns, checkpoint_id, task_id, idx)
)"#,
    // Older schemas declared the blob NOT NULL; empty channels store none
    "ALTER TABLE checkpoint_blobs MODIFY COLUMN `blob` LONGBLOB",
];

pub const STORE_MIGRATIONS_TABLE: &str = "store_migrations";

pub const STORE_MIGRATIONS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS store_migrations (
    v INTEGER PRIMARY KEY
)"#,
    r#"CREATE TABLE IF NOT EXISTS store (
    prefix VARCHAR(150) NOT NULL,
    `key` VARCHAR(150) NOT NULL,
    value JSON NOT NULL,
    created_at TIMESTAMP(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6),
    updated_at TIMESTAMP(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6) ON UPDATE CURRENT_TIMESTAMP(6),
    PRIMARY KEY (prefix, `key`)
)"#,
    "CREATE INDEX store_updated_at_idx ON store (updated_at)",
];

/// Highest applied version, or -1 when nothing has been applied
///
/// A missing tracking table counts as nothing applied.
pub async fn get_schema_version(pool: &MySqlPool, table: &str) -> Result<i32> {
    let query = format!("SELECT v FROM {} ORDER BY v DESC LIMIT 1", table);
    match sqlx::query_scalar::<_, i32>(&query).fetch_optional(pool).await {
        Ok(Some(version)) => Ok(version),
        Ok(None) => Ok(-1),
        Err(e) if is_no_such_table(&e) => Ok(-1),
        Err(e) => Err(e.into()),
    }
}

/// Apply every migration after the recorded version
///
/// Safe to call repeatedly; an up-to-date database runs nothing.
pub async fn run_migrations(pool: &MySqlPool, table: &str, migrations: &[&str]) -> Result<()> {
    let current_version = get_schema_version(pool, table).await?;
    let target_version = migrations.len() as i32 - 1;

    if current_version == target_version {
        info!("{} schema is up to date (v{})", table, current_version);
        return Ok(());
    }

    if current_version > target_version {
        warn!(
            "{} schema version ({}) is newer than code version ({})",
            table, current_version, target_version
        );
        return Ok(());
    }

    info!(
        "Running {} migrations: v{} -> v{}",
        table, current_version, target_version
    );

    let insert = format!("INSERT INTO {} (v) VALUES (?)", table);
    for (version, migration) in migrations
        .iter()
        .enumerate()
        .skip((current_version + 1) as usize)
    {
        debug!(version, "{}", migration);
        sqlx::raw_sql(migration).execute(pool).await?;
        sqlx::query(&insert)
            .bind(version as i32)
            .execute(pool)
            .await?;
        info!("✓ {} migration v{} completed", table, version);
    }

    Ok(())
}

fn is_no_such_table(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(NO_SUCH_TABLE),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_tables_are_created_first() {
        assert!(CHECKPOINT_MIGRATIONS[0].contains(CHECKPOINT_MIGRATIONS_TABLE));
        assert!(STORE_MIGRATIONS[0].contains(STORE_MIGRATIONS_TABLE));
    }

    #[test]
    fn test_checkpoint_tables_present() {
        let all = CHECKPOINT_MIGRATIONS.join("\n");
        for table in ["checkpoints", "checkpoint_blobs", "checkpoint_writes"] {
            assert!(
                all.contains(&format!("CREATE TABLE IF NOT EXISTS {} (", table)),
                "missing table {}",
                table
            );
        }
    }

    #[test]
    fn test_other_errors_are_not_missing_table() {
        assert!(!is_no_such_table(&sqlx::Error::RowNotFound));
    }
}
