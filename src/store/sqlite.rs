use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;

use super::SeenStore;
use crate::core::error::StoreError;

pub struct SqliteSeenStore {
    pool: SqlitePool,
}

impl SqliteSeenStore {
    pub async fn new(database_path: &str) -> Result<Self, StoreError> {
        let connection_string = if database_path.starts_with("sqlite:") {
            database_path.to_string()
        } else {
            if let Some(parent) = Path::new(database_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            format!("sqlite://{}?mode=rwc", database_path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&connection_string)
            .await?;

        Self::with_pool(pool).await
    }

    /// Throwaway store. One connection, since every in-memory connection is its own database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS seen_items (
                listing_id TEXT PRIMARY KEY,
                first_seen_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_seen_items_first_seen
            ON seen_items(first_seen_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("✅ Seen-item store schema initialized");

        Ok(())
    }
}

#[async_trait]
impl SeenStore for SqliteSeenStore {
    async fn is_new(&self, listing_id: &str) -> Result<bool, StoreError> {
        let found: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT 1 FROM seen_items WHERE listing_id = ?
            "#,
        )
        .bind(listing_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_none())
    }

    async fn mark_seen(&self, listing_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        // single statement, so each listing's mark is all-or-nothing
        sqlx::query(
            r#"
            INSERT INTO seen_items (listing_id, first_seen_at)
            VALUES (?, ?)
            ON CONFLICT(listing_id) DO NOTHING
            "#,
        )
        .bind(listing_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn evict_older_than(&self, threshold: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM seen_items WHERE first_seen_at < ?
            "#,
        )
        .bind(threshold)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn first_seen(&self, listing_id: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let at = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            SELECT first_seen_at FROM seen_items WHERE listing_id = ?
            "#,
        )
        .bind(listing_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(at)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seen_items")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }
}
