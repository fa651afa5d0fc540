//! HTTP API over the feed store, the ingestion pipeline and the snapshot.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/feeds` | Active feeds grouped by priority |
//! | `POST` | `/feeds` | Subscribe to a feed |
//! | `PATCH` | `/feeds` | Change a feed's status or priority |
//! | `DELETE` | `/feeds` | Unsubscribe |
//! | `GET` | `/albums` | Albums from the active album feeds |
//! | `GET` | `/publishers` | Publishers from the last snapshot |
//! | `GET` | `/health` | Liveness probe |
//!
//! Request bodies are read as raw bytes and decoded here so that any
//! malformed body is a `400` with the usual `{ error, kind }` shape.

mod albums;
mod error;
mod feeds;

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::config::{AlbumsSource, Config};
use crate::feed::Ingestor;
use crate::storage::FeedStore;

pub use error::ApiError;

/// Per-deployment knobs the handlers need.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub snapshot_path: PathBuf,
    pub albums_source: AlbumsSource,
    pub feeds_max_age_secs: u64,
}

impl From<&Config> for ApiSettings {
    fn from(config: &Config) -> Self {
        Self {
            snapshot_path: config.snapshot_path.clone(),
            albums_source: config.albums_source,
            feeds_max_age_secs: config.feeds_max_age_secs,
        }
    }
}

/// Shared state passed to all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: FeedStore,
    pub ingestor: Ingestor,
    pub settings: Arc<ApiSettings>,
}

impl AppState {
    pub fn new(store: FeedStore, ingestor: Ingestor, settings: ApiSettings) -> Self {
        Self {
            store,
            ingestor,
            settings: Arc::new(settings),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/feeds",
            get(feeds::list)
                .post(feeds::create)
                .patch(feeds::update)
                .delete(feeds::remove),
        )
        .route("/albums", get(albums::albums))
        .route("/publishers", get(albums::publishers))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Decode a JSON request body, mapping any failure to `400`.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::BadRequest("Request body is required".into()));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))
}
