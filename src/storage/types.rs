use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors returned by the feed store.
///
/// `Validation`, `Duplicate` and `NotFound` describe bad caller input; the
/// remaining variants are systemic storage failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The submitted feed is malformed (bad URL, unknown type, ...)
    #[error("Invalid feed: {0}")]
    Validation(String),

    /// A feed with the same URL or derived id already exists
    #[error("Feed already exists: {0}")]
    Duplicate(String),

    /// No feed with the given id
    #[error("Feed not found: {0}")]
    NotFound(String),

    /// Another process holds the database lock
    #[error("The feed database is locked by another process")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A stored row could not be mapped back to a feed
    #[error("Corrupt feed row '{id}': {reason}")]
    Corrupt { id: String, reason: String },

    /// Generic database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return StoreError::InstanceLocked;
        }

        StoreError::Database(err)
    }

    /// Short machine-readable name used in logs and API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Validation(_) => "validation",
            StoreError::Duplicate(_) => "duplicate",
            StoreError::NotFound(_) => "not_found",
            StoreError::InstanceLocked
            | StoreError::Migration(_)
            | StoreError::Corrupt { .. }
            | StoreError::Database(_) => "storage",
        }
    }
}

// ============================================================================
// Feed Enums
// ============================================================================

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        "unknown {} '{}' (expected one of: {})",
                        stringify!($name),
                        other,
                        [$($text),+].join(", ")
                    )),
                }
            }
        }
    };
}

/// Kind of document a feed is expected to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedType {
    Album,
    Publisher,
}

string_enum!(FeedType { Album => "album", Publisher => "publisher" });

/// Ingestion priority bucket used to group album feeds in `/feeds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedPriority {
    #[default]
    Core,
    Extended,
    Low,
}

string_enum!(FeedPriority { Core => "core", Extended => "extended", Low => "low" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    #[default]
    Active,
    Inactive,
}

string_enum!(FeedStatus { Active => "active", Inactive => "inactive" });

// ============================================================================
// Data Structures
// ============================================================================

/// A subscribed feed as persisted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    pub id: String,
    pub original_url: String,
    #[serde(rename = "type")]
    pub feed_type: FeedType,
    pub title: String,
    pub priority: FeedPriority,
    pub status: FeedStatus,
    pub added_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Feed {
    pub fn is_active(&self) -> bool {
        self.status == FeedStatus::Active
    }
}

/// A feed submission as received at the API boundary.
///
/// Tagged on `type`, so an unknown type fails deserialization before it
/// reaches the store.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedSubmission {
    Album {
        url: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        priority: Option<FeedPriority>,
    },
    Publisher {
        url: String,
        #[serde(default)]
        title: Option<String>,
    },
}

impl FeedSubmission {
    pub fn url(&self) -> &str {
        match self {
            FeedSubmission::Album { url, .. } | FeedSubmission::Publisher { url, .. } => url,
        }
    }

    pub fn feed_type(&self) -> FeedType {
        match self {
            FeedSubmission::Album { .. } => FeedType::Album,
            FeedSubmission::Publisher { .. } => FeedType::Publisher,
        }
    }
}

/// One entry of the legacy flat-file feed list (`feeds.json`).
///
/// Only `originalUrl` (or `url`) and `type` are required; everything else
/// falls back to store defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyFeedEntry {
    #[serde(alias = "url")]
    pub original_url: String,
    #[serde(rename = "type")]
    pub feed_type: FeedType,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub priority: Option<FeedPriority>,
    #[serde(default)]
    pub status: Option<FeedStatus>,
}

/// Top-level shape of the legacy feed list file.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyFeedList {
    pub feeds: Vec<LegacyFeedEntry>,
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub duplicates: usize,
    pub invalid: usize,
}

// ============================================================================
// Helper Types
// ============================================================================

/// Fields needed to insert a feed row.
#[derive(Debug, Clone)]
pub(crate) struct NewFeed<'a> {
    pub url: &'a str,
    pub feed_type: FeedType,
    pub title: Option<&'a str>,
    pub priority: FeedPriority,
    pub status: FeedStatus,
}

/// Internal row type for feed queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedDbRow {
    pub id: String,
    pub original_url: String,
    pub feed_type: String,
    pub title: String,
    pub priority: String,
    pub status: String,
    pub added_at: i64,
    pub last_updated: i64,
}

impl FeedDbRow {
    pub(crate) fn into_feed(self) -> Result<Feed, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: self.id.clone(),
            reason,
        };
        let feed_type = self.feed_type.parse().map_err(corrupt)?;
        let priority = self.priority.parse().map_err(corrupt)?;
        let status = self.status.parse().map_err(corrupt)?;
        let added_at = timestamp(self.added_at).ok_or_else(|| corrupt("bad added_at".into()))?;
        let last_updated =
            timestamp(self.last_updated).ok_or_else(|| corrupt("bad last_updated".into()))?;

        Ok(Feed {
            id: self.id,
            original_url: self.original_url,
            feed_type,
            title: self.title,
            priority,
            status,
            added_at,
            last_updated,
        })
    }
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}
