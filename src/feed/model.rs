//! Normalized records produced by the parser and served by the API.
//!
//! `*Record` types are pure parser output and depend only on the document
//! bytes. [`Album`] and [`Publisher`] wrap them with the metadata of the feed
//! they came from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{Feed, FeedPriority};
use crate::util::slugify;

/// One playable item of an album.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub title: String,
    /// Length in whole seconds; 0 when the feed does not say.
    pub duration: u64,
    /// Enclosure URL.
    pub url: String,
    pub track_number: u32,
    pub subtitle: Option<String>,
    pub summary: Option<String>,
    pub image: Option<String>,
    pub explicit: bool,
    pub keywords: Vec<String>,
    pub guid: Option<String>,
    /// Publication date as RFC 3339, when the feed provides a parseable one.
    pub published: Option<String>,
}

/// Reference to another feed (`<podcast:remoteItem>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteItem {
    pub feed_guid: String,
    pub feed_url: Option<String>,
    pub item_guid: Option<String>,
    pub medium: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Funding {
    pub url: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRecipient {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub recipient_type: String,
    pub address: String,
    pub split: u32,
    pub fee: bool,
}

/// Value-for-value payment block (`<podcast:value>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueBlock {
    #[serde(rename = "type")]
    pub value_type: String,
    pub method: String,
    pub suggested: Option<String>,
    pub recipients: Vec<ValueRecipient>,
}

/// Album fields extracted from a feed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumRecord {
    pub title: String,
    pub artist: String,
    pub description: String,
    pub cover_art: Option<String>,
    pub link: Option<String>,
    pub language: Option<String>,
    pub explicit: bool,
    pub podcast_guid: Option<String>,
    pub medium: Option<String>,
    pub tracks: Vec<Track>,
    pub podroll: Vec<RemoteItem>,
    pub publisher: Option<RemoteItem>,
    pub funding: Vec<Funding>,
    pub value: Option<ValueBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublisherInfo {
    pub title: String,
    pub artist: String,
    pub description: String,
    pub cover_art: Option<String>,
    pub link: Option<String>,
    pub podcast_guid: Option<String>,
}

/// Publisher fields extracted from a feed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublisherRecord {
    pub info: PublisherInfo,
    pub items: Vec<RemoteItem>,
}

/// Result of parsing one feed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ParsedFeed {
    Album(AlbumRecord),
    Publisher(PublisherRecord),
}

impl ParsedFeed {
    pub fn kind(&self) -> &'static str {
        match self {
            ParsedFeed::Album(_) => "album",
            ParsedFeed::Publisher(_) => "publisher",
        }
    }
}

/// An album as served by the API, tagged with its originating feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    /// Slug of the album title.
    pub id: String,
    #[serde(flatten)]
    pub record: AlbumRecord,
    pub feed_id: String,
    pub feed_url: String,
    pub priority: FeedPriority,
    pub last_updated: DateTime<Utc>,
}

impl Album {
    pub fn from_record(record: AlbumRecord, feed: &Feed) -> Self {
        let id = match slugify(&record.title) {
            slug if slug.is_empty() => "untitled".to_string(),
            slug => slug,
        };
        Self {
            id,
            record,
            feed_id: feed.id.clone(),
            feed_url: feed.original_url.clone(),
            priority: feed.priority,
            last_updated: feed.last_updated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseStatus {
    Success,
}

/// A publisher as served by the API, tagged with its originating feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Publisher {
    /// Id of the originating feed.
    pub id: String,
    pub title: String,
    pub original_url: String,
    pub parse_status: ParseStatus,
    pub last_parsed: DateTime<Utc>,
    pub publisher_info: PublisherInfo,
    pub publisher_items: Vec<RemoteItem>,
}

impl Publisher {
    pub fn from_record(record: PublisherRecord, feed: &Feed, parsed_at: DateTime<Utc>) -> Self {
        Self {
            id: feed.id.clone(),
            title: record.info.title.clone(),
            original_url: feed.original_url.clone(),
            parse_status: ParseStatus::Success,
            last_parsed: parsed_at,
            publisher_info: record.info,
            publisher_items: record.items,
        }
    }
}
