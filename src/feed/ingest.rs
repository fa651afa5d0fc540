use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use super::cache::ParseCache;
use super::fetcher::FeedFetcher;
use super::model::{Album, ParsedFeed, Publisher};
use crate::storage::{Feed, FeedType};

pub const DEFAULT_CONCURRENCY: usize = 10;

/// Failure kind for a feed whose document is not of its subscribed type.
pub const TYPE_MISMATCH: &str = "type_mismatch";

/// Where in the per-feed pipeline a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStage {
    Fetch,
    Parse,
}

impl IngestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStage::Fetch => "fetch",
            IngestStage::Parse => "parse",
        }
    }
}

/// A feed that produced no record in this pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestFailure {
    pub feed_id: String,
    pub feed_url: String,
    pub stage: IngestStage,
    pub kind: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestedRecord {
    Album(Album),
    Publisher(Publisher),
}

/// Outcome of one ingestion pass.
///
/// `records` keeps the order of the input feeds; every input feed appears in
/// exactly one of `records` or `failures`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub records: Vec<IngestedRecord>,
    pub failures: Vec<IngestFailure>,
}

impl IngestReport {
    pub fn albums(&self) -> impl Iterator<Item = &Album> {
        self.records.iter().filter_map(|r| match r {
            IngestedRecord::Album(a) => Some(a),
            IngestedRecord::Publisher(_) => None,
        })
    }

    pub fn publishers(&self) -> impl Iterator<Item = &Publisher> {
        self.records.iter().filter_map(|r| match r {
            IngestedRecord::Publisher(p) => Some(p),
            IngestedRecord::Album(_) => None,
        })
    }

    pub fn into_albums(self) -> Vec<Album> {
        self.records
            .into_iter()
            .filter_map(|r| match r {
                IngestedRecord::Album(a) => Some(a),
                IngestedRecord::Publisher(_) => None,
            })
            .collect()
    }
}

/// Runs fetch and parse across a set of feeds with bounded concurrency.
#[derive(Clone)]
pub struct Ingestor {
    fetcher: FeedFetcher,
    cache: ParseCache,
    concurrency: usize,
}

impl Ingestor {
    pub fn new(fetcher: FeedFetcher, cache: ParseCache, concurrency: usize) -> Self {
        Self {
            fetcher,
            cache,
            concurrency: concurrency.max(1),
        }
    }

    /// Fetch and parse every feed in `feeds`.
    ///
    /// Never fails as a whole: a feed that cannot be fetched or parsed is
    /// logged and reported in [`IngestReport::failures`] while the rest of
    /// the batch continues. Up to `concurrency` feeds are in flight at once;
    /// results come back in input order.
    pub async fn ingest(&self, feeds: &[Feed]) -> IngestReport {
        if feeds.is_empty() {
            return IngestReport::default();
        }

        let outcomes: Vec<Result<IngestedRecord, IngestFailure>> = stream::iter(feeds.to_vec())
            .map(|feed| {
                let this = self.clone();
                async move { this.ingest_one(&feed).await }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = IngestReport::default();
        for outcome in outcomes {
            match outcome {
                Ok(record) => report.records.push(record),
                Err(failure) => report.failures.push(failure),
            }
        }

        tracing::info!(
            feeds = feeds.len(),
            records = report.records.len(),
            failures = report.failures.len(),
            "Ingestion pass complete"
        );
        report
    }

    async fn ingest_one(&self, feed: &Feed) -> Result<IngestedRecord, IngestFailure> {
        let bytes = self
            .fetcher
            .fetch(&feed.original_url)
            .await
            .map_err(|e| failure(feed, IngestStage::Fetch, e.kind(), &e))?;

        let parsed = self
            .cache
            .parse(&bytes)
            .map_err(|e| failure(feed, IngestStage::Parse, e.kind(), &e))?;

        if parsed.kind() != feed.feed_type.as_str() {
            let reason = format!(
                "subscribed as {} but the document is a {} feed",
                feed.feed_type,
                parsed.kind()
            );
            return Err(failure(feed, IngestStage::Parse, TYPE_MISMATCH, &reason));
        }

        Ok(match parsed {
            ParsedFeed::Album(record) => IngestedRecord::Album(Album::from_record(record, feed)),
            ParsedFeed::Publisher(record) => {
                IngestedRecord::Publisher(Publisher::from_record(record, feed, Utc::now()))
            }
        })
    }
}

fn failure(
    feed: &Feed,
    stage: IngestStage,
    kind: &str,
    error: &dyn std::fmt::Display,
) -> IngestFailure {
    tracing::warn!(
        feed_id = %feed.id,
        feed_url = %feed.original_url,
        stage = stage.as_str(),
        kind = kind,
        error = %error,
        "Feed skipped"
    );
    IngestFailure {
        feed_id: feed.id.clone(),
        feed_url: feed.original_url.clone(),
        stage,
        kind: kind.to_string(),
        error: error.to_string(),
    }
}

/// Active feeds of one type, preserving store order.
pub fn active_of_type(feeds: Vec<Feed>, feed_type: FeedType) -> Vec<Feed> {
    feeds
        .into_iter()
        .filter(|f| f.is_active() && f.feed_type == feed_type)
        .collect()
}
