use chrono::Utc;

use super::schema::FeedStore;
use super::types::{
    Feed, FeedDbRow, FeedPriority, FeedStatus, FeedSubmission, FeedType, ImportSummary,
    LegacyFeedEntry, NewFeed, StoreError,
};
use crate::util::{feed_id_from_url, validate_url};

const SELECT_FEEDS: &str = "SELECT id, original_url, feed_type, title, priority, status, \
                            added_at, last_updated FROM feeds";

impl FeedStore {
    // ========================================================================
    // Reads
    // ========================================================================

    /// All feeds in insertion order.
    pub async fn list(&self) -> Result<Vec<Feed>, StoreError> {
        let rows: Vec<FeedDbRow> = sqlx::query_as(&format!("{SELECT_FEEDS} ORDER BY rowid"))
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        rows.into_iter().map(FeedDbRow::into_feed).collect()
    }

    /// Feeds with `status = active`, in insertion order.
    pub async fn list_active(&self) -> Result<Vec<Feed>, StoreError> {
        let rows: Vec<FeedDbRow> =
            sqlx::query_as(&format!("{SELECT_FEEDS} WHERE status = ? ORDER BY rowid"))
                .bind(FeedStatus::Active.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(StoreError::from_sqlx)?;
        rows.into_iter().map(FeedDbRow::into_feed).collect()
    }

    pub async fn get(&self, id: &str) -> Result<Feed, StoreError> {
        let row: Option<FeedDbRow> = sqlx::query_as(&format!("{SELECT_FEEDS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        row.ok_or_else(|| StoreError::NotFound(id.to_string()))?
            .into_feed()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Subscribe to a feed.
    ///
    /// The title defaults to the URL when absent or blank; priority defaults
    /// to `core` and status to `active`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Validation`] if the URL is malformed, not http(s), or
    ///   points at a host the store's policy rejects
    /// - [`StoreError::Duplicate`] if the URL, or another URL with the same
    ///   host and path, is already subscribed
    pub async fn add(
        &self,
        url: &str,
        feed_type: FeedType,
        title: Option<&str>,
    ) -> Result<Feed, StoreError> {
        self.insert(NewFeed {
            url,
            feed_type,
            title,
            priority: FeedPriority::default(),
            status: FeedStatus::default(),
        })
        .await
    }

    /// Subscribe to a feed from a validated API submission.
    pub async fn add_submission(&self, submission: &FeedSubmission) -> Result<Feed, StoreError> {
        let (title, priority) = match submission {
            FeedSubmission::Album {
                title, priority, ..
            } => (title.as_deref(), priority.unwrap_or_default()),
            FeedSubmission::Publisher { title, .. } => (title.as_deref(), FeedPriority::default()),
        };

        self.insert(NewFeed {
            url: submission.url(),
            feed_type: submission.feed_type(),
            title,
            priority,
            status: FeedStatus::default(),
        })
        .await
    }

    /// Unsubscribe from a feed.
    pub async fn remove(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM feeds WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        tracing::info!(feed_id = %id, "Feed removed");
        Ok(())
    }

    pub async fn set_status(&self, id: &str, status: FeedStatus) -> Result<Feed, StoreError> {
        self.update_fields(id, Some(status), None).await
    }

    pub async fn set_priority(&self, id: &str, priority: FeedPriority) -> Result<Feed, StoreError> {
        self.update_fields(id, None, Some(priority)).await
    }

    /// Change status and priority together in one statement.
    ///
    /// Fields left as `None` keep their stored value.
    pub async fn update(
        &self,
        id: &str,
        status: Option<FeedStatus>,
        priority: Option<FeedPriority>,
    ) -> Result<Feed, StoreError> {
        self.update_fields(id, status, priority).await
    }

    /// Bulk-load entries from the legacy flat-file feed list.
    ///
    /// Duplicates and invalid entries are skipped and counted; only storage
    /// failures abort the import.
    pub async fn import(&self, entries: &[LegacyFeedEntry]) -> Result<ImportSummary, StoreError> {
        let mut summary = ImportSummary::default();

        for entry in entries {
            let result = self
                .insert(NewFeed {
                    url: &entry.original_url,
                    feed_type: entry.feed_type,
                    title: entry.title.as_deref(),
                    priority: entry.priority.unwrap_or_default(),
                    status: entry.status.unwrap_or_default(),
                })
                .await;

            match result {
                Ok(_) => summary.imported += 1,
                Err(StoreError::Duplicate(url)) => {
                    tracing::debug!(url = %url, "Skipping duplicate feed during import");
                    summary.duplicates += 1;
                }
                Err(StoreError::Validation(reason)) => {
                    tracing::warn!(url = %entry.original_url, reason = %reason, "Skipping invalid feed during import");
                    summary.invalid += 1;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            imported = summary.imported,
            duplicates = summary.duplicates,
            invalid = summary.invalid,
            "Feed import finished"
        );
        Ok(summary)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn insert(&self, new: NewFeed<'_>) -> Result<Feed, StoreError> {
        let url = new.url.trim();
        validate_url(url, self.host_policy)
            .map_err(|e| StoreError::Validation(format!("{url}: {e}")))?;
        let id = feed_id_from_url(url).map_err(|e| StoreError::Validation(format!("{url}: {e}")))?;

        let title = new
            .title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(url)
            .to_string();
        let now = Utc::now().timestamp();

        // `id` and `original_url` are both unique; the INSERT alone detects duplicates
        let inserted = sqlx::query(
            "INSERT INTO feeds (id, original_url, feed_type, title, priority, status, added_at, last_updated) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(url)
        .bind(new.feed_type.as_str())
        .bind(&title)
        .bind(new.priority.as_str())
        .bind(new.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(StoreError::Duplicate(url.to_string()));
            }
            Err(e) => return Err(StoreError::from_sqlx(e)),
        }

        tracing::info!(feed_id = %id, url = %url, feed_type = %new.feed_type, "Feed added");
        self.get(&id).await
    }

    async fn update_fields(
        &self,
        id: &str,
        status: Option<FeedStatus>,
        priority: Option<FeedPriority>,
    ) -> Result<Feed, StoreError> {
        let result = sqlx::query(
            "UPDATE feeds SET status = COALESCE(?, status), priority = COALESCE(?, priority), \
             last_updated = ? WHERE id = ?",
        )
        .bind(status.map(|s| s.as_str()))
        .bind(priority.map(|p| p.as_str()))
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        tracing::info!(
            feed_id = %id,
            status = status.map(|s| s.as_str()),
            priority = priority.map(|p| p.as_str()),
            "Feed updated"
        );
        self.get(id).await
    }
}
