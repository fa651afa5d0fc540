use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::StoreError;
use crate::util::HostPolicy;

// ============================================================================
// Feed Store
// ============================================================================

/// SQLite-backed store for the subscribed feed list.
///
/// Cheap to clone: clones share the same connection pool.
#[derive(Clone)]
pub struct FeedStore {
    pub(crate) pool: SqlitePool,
    pub(crate) host_policy: HostPolicy,
}

impl FeedStore {
    /// Open a database connection and run migrations
    ///
    /// Pass `":memory:"` for a throwaway in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InstanceLocked` if another process has the
    /// database locked, `StoreError::Migration` if the schema could not be
    /// created, and `StoreError::Database` for anything else.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // busy_timeout=5000: concurrent add/remove requests wait for the write
        // lock instead of failing with SQLITE_BUSY.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(StoreError::from_sqlx)?
            .pragma("busy_timeout", "5000");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(StoreError::from_sqlx)?;

        let store = Self {
            pool,
            host_policy: HostPolicy::default(),
        };
        store.migrate().await.map_err(|e| match StoreError::from_sqlx(e) {
            StoreError::Database(e) => StoreError::Migration(e.to_string()),
            other => other,
        })?;

        tracing::debug!(path = %path, "Feed store opened");
        Ok(store)
    }

    /// Set which hosts newly added feeds may point at.
    pub fn with_host_policy(mut self, policy: HostPolicy) -> Self {
        self.host_policy = policy;
        self
    }

    /// Run migrations atomically within a transaction.
    ///
    /// All statements use `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id TEXT PRIMARY KEY,
                original_url TEXT UNIQUE NOT NULL,
                feed_type TEXT NOT NULL CHECK (feed_type IN ('album', 'publisher')),
                title TEXT NOT NULL,
                priority TEXT NOT NULL DEFAULT 'core'
                    CHECK (priority IN ('core', 'extended', 'low')),
                status TEXT NOT NULL DEFAULT 'active'
                    CHECK (status IN ('active', 'inactive')),
                added_at INTEGER NOT NULL,
                last_updated INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Covers list_active(), which filters on status and keeps insertion order
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_feeds_status ON feeds(status)")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
