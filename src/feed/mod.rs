//! Feed retrieval, parsing and ingestion.
//!
//! - [`parser`] turns raw RSS/Atom/Podcasting 2.0 bytes into album or
//!   publisher records; parsing is pure, so results are cached by content
//!   hash in [`ParseCache`]
//! - [`fetcher`] retrieves documents over HTTP with a timeout and size limit
//! - [`ingest`] runs fetch+parse across the active feeds with bounded
//!   concurrency and isolates per-feed failures
//! - [`snapshot`] persists an ingestion pass for the read-only endpoints
//!
//! # Example
//!
//! ```ignore
//! let ingestor = Ingestor::new(FeedFetcher::new(FetcherConfig::default())?, ParseCache::default(), 10);
//! let report = ingestor.ingest(&store.list_active().await?).await;
//! for failure in &report.failures {
//!     eprintln!("{}: {}", failure.feed_id, failure.error);
//! }
//! ```

mod atom;
mod cache;
pub mod fetcher;
pub mod ingest;
mod model;
pub mod parser;
pub mod snapshot;
mod xml;

pub use cache::ParseCache;
pub use fetcher::{FeedFetcher, FetchError, FetcherConfig};
pub use ingest::{IngestFailure, IngestReport, IngestStage, IngestedRecord, Ingestor};
pub use model::{
    Album, AlbumRecord, Funding, ParseStatus, ParsedFeed, Publisher, PublisherInfo,
    PublisherRecord, RemoteItem, Track, ValueBlock, ValueRecipient,
};
pub use parser::{parse_feed, ParseError};
pub use snapshot::{Snapshot, SnapshotError};
