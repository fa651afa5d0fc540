//! Ingestion and normalization of music-oriented RSS feeds.
//!
//! A SQLite-backed list of subscribed feeds ([`storage`]) is fetched and
//! parsed into album and publisher records ([`feed`]) and served as JSON
//! ([`api`]).

pub mod api;
pub mod config;
pub mod feed;
pub mod storage;
pub mod util;
