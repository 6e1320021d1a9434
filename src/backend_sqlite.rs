//! Local SQLite index backend.
//!
//! Stores each resource's named fields as a row in `records` and its
//! flattened text in the `records_fts` FTS5 table, so the index can be
//! queried with `rix search` without any external service.

use async_trait::async_trait;
use repo_indexer_core::backend::{BackendResponse, IndexBackend};
use repo_indexer_core::error::BackendError;
use repo_indexer_core::models::ContentKind;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::fields::{flatten_text, parse_fields};
use crate::search::{self, SearchHit};
use crate::{db, migrate};

/// A stored record, as read back from the index.
#[derive(Debug, Clone)]
pub struct IndexedRecord {
    pub resource_id: String,
    pub fields: serde_json::Value,
    pub updated_at: i64,
}

pub struct SqliteBackend {
    name: String,
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Open the index at `path` and bring its schema up to date.
    pub async fn open(name: impl Into<String>, path: &Path) -> anyhow::Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self {
            name: name.into(),
            pool,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn get(&self, resource_id: &str) -> anyhow::Result<Option<IndexedRecord>> {
        let row = sqlx::query(
            "SELECT resource_id, fields_json, updated_at FROM records WHERE resource_id = ?",
        )
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> anyhow::Result<IndexedRecord> {
            let fields_json: String = row.get("fields_json");
            Ok(IndexedRecord {
                resource_id: row.get("resource_id"),
                fields: serde_json::from_str(&fields_json)?,
                updated_at: row.get("updated_at"),
            })
        })
        .transpose()
    }

    pub async fn count(&self) -> anyhow::Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM records")
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn search(&self, query: &str, limit: i64) -> anyhow::Result<Vec<SearchHit>> {
        search::search_records(&self.pool, query, limit).await
    }
}

fn storage(err: sqlx::Error) -> BackendError {
    BackendError::Storage(err.to_string())
}

#[async_trait]
impl IndexBackend for SqliteBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn content_kind(&self) -> ContentKind {
        ContentKind::NamedFields
    }

    async fn update(&self, resource_id: &str, content: &[u8]) -> Result<BackendResponse, BackendError> {
        let fields = parse_fields(resource_id, content)?;
        let body = flatten_text(&fields);
        let fields_json = serde_json::Value::Object(fields).to_string();
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await.map_err(storage)?;
        sqlx::query(
            r#"
            INSERT INTO records (resource_id, fields_json, body, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(resource_id) DO UPDATE SET
                fields_json = excluded.fields_json,
                body = excluded.body,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(resource_id)
        .bind(&fields_json)
        .bind(&body)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        sqlx::query("DELETE FROM records_fts WHERE resource_id = ?")
            .bind(resource_id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        sqlx::query("INSERT INTO records_fts (resource_id, body) VALUES (?, ?)")
            .bind(resource_id)
            .bind(&body)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        tx.commit().await.map_err(storage)?;

        Ok(BackendResponse::ok())
    }

    async fn remove(&self, resource_id: &str) -> Result<BackendResponse, BackendError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        let removed = sqlx::query("DELETE FROM records WHERE resource_id = ?")
            .bind(resource_id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?
            .rows_affected();
        sqlx::query("DELETE FROM records_fts WHERE resource_id = ?")
            .bind(resource_id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        tx.commit().await.map_err(storage)?;

        // Removing an absent record is not an error
        if removed == 0 {
            Ok(BackendResponse::with_detail("not indexed"))
        } else {
            Ok(BackendResponse::ok())
        }
    }
}
