use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use shared::domain::{EntityKind, RecordId};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

const MEMORY_URL: &str = "sqlite::memory:";

/// Document store for every entity kind. Each record is one JSON body keyed
/// by `(kind, id)`; listing preserves insertion order.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub kind: EntityKind,
    pub id: RecordId,
    pub body: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = if database_url == MEMORY_URL {
            // every connection to :memory: is a separate database
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(connect_options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(connect_options)
                .await?
        };

        let storage = Self { pool };
        storage.ensure_records_table().await?;
        Ok(storage)
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_records_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                seq        INTEGER PRIMARY KEY AUTOINCREMENT,
                kind       TEXT NOT NULL,
                id         TEXT NOT NULL,
                body       TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (kind, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure records table exists")?;
        Ok(())
    }

    pub async fn list_records(&self, kind: EntityKind) -> Result<Vec<StoredRecord>> {
        let rows = sqlx::query(
            "SELECT kind, id, body, created_at, updated_at FROM records WHERE kind = ? ORDER BY seq",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to list {kind}"))?;

        rows.iter().map(stored_record_from_row).collect()
    }

    pub async fn get_record(&self, kind: EntityKind, id: &RecordId) -> Result<Option<StoredRecord>> {
        let row = sqlx::query(
            "SELECT kind, id, body, created_at, updated_at FROM records WHERE kind = ? AND id = ?",
        )
        .bind(kind.as_str())
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to load {kind}/{id}"))?;

        row.as_ref().map(stored_record_from_row).transpose()
    }

    /// Returns `false` when a record with the same kind and id already exists.
    pub async fn insert_record(
        &self,
        kind: EntityKind,
        id: &RecordId,
        body: &serde_json::Value,
    ) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO records (kind, id, body, created_at, updated_at) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(kind, id) DO NOTHING",
        )
        .bind(kind.as_str())
        .bind(id.as_str())
        .bind(serde_json::to_string(body)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert {kind}/{id}"))?;
        Ok(result.rows_affected() == 1)
    }

    /// Returns `false` when there is nothing to replace.
    pub async fn replace_record(
        &self,
        kind: EntityKind,
        id: &RecordId,
        body: &serde_json::Value,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE records SET body = ?, updated_at = ? WHERE kind = ? AND id = ?")
                .bind(serde_json::to_string(body)?)
                .bind(Utc::now())
                .bind(kind.as_str())
                .bind(id.as_str())
                .execute(&self.pool)
                .await
                .with_context(|| format!("failed to update {kind}/{id}"))?;
        Ok(result.rows_affected() == 1)
    }

    /// Returns `false` when there is nothing to delete.
    pub async fn delete_record(&self, kind: EntityKind, id: &RecordId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM records WHERE kind = ? AND id = ?")
            .bind(kind.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete {kind}/{id}"))?;
        Ok(result.rows_affected() == 1)
    }
}

fn stored_record_from_row(row: &SqliteRow) -> Result<StoredRecord> {
    let kind: String = row.try_get("kind")?;
    let id: String = row.try_get("id")?;
    let body: String = row.try_get("body")?;
    Ok(StoredRecord {
        kind: kind.parse()?,
        body: serde_json::from_str(&body)
            .with_context(|| format!("corrupt record body for {kind}/{id}"))?,
        id: RecordId(id),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == MEMORY_URL || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
