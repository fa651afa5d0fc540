use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use super::{ApiError, AppState};
use crate::config::AlbumsSource;
use crate::feed::ingest::active_of_type;
use crate::feed::{Album, Publisher, Snapshot};
use crate::storage::FeedType;

#[derive(Debug, Serialize)]
pub struct AlbumsResponse {
    pub albums: Vec<Album>,
    pub count: usize,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct PublishersResponse {
    pub publishers: Vec<Publisher>,
    pub count: usize,
    pub timestamp: String,
}

pub(super) async fn albums(State(state): State<AppState>) -> Result<Json<AlbumsResponse>, ApiError> {
    let albums = match state.settings.albums_source {
        AlbumsSource::Live => {
            let feeds = active_of_type(state.store.list_active().await?, FeedType::Album);
            state.ingestor.ingest(&feeds).await.into_albums()
        }
        AlbumsSource::Snapshot => read_snapshot(&state)
            .await?
            .map(|s| s.albums)
            .unwrap_or_default(),
    };

    Ok(Json(AlbumsResponse {
        count: albums.len(),
        albums,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

pub(super) async fn publishers(
    State(state): State<AppState>,
) -> Result<Json<PublishersResponse>, ApiError> {
    let publishers = read_snapshot(&state)
        .await?
        .map(|s| s.publishers)
        .unwrap_or_default();

    Ok(Json(PublishersResponse {
        count: publishers.len(),
        publishers,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

/// Load the snapshot off the async runtime. A missing file is logged and
/// treated as empty.
async fn read_snapshot(state: &AppState) -> Result<Option<Snapshot>, ApiError> {
    let path = state.settings.snapshot_path.clone();
    let snapshot = tokio::task::spawn_blocking({
        let path = path.clone();
        move || Snapshot::read(&path)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("snapshot reader task failed: {e}")))??;

    if snapshot.is_none() {
        tracing::warn!(path = %path.display(), "Snapshot file not found, serving empty list");
    }
    Ok(snapshot)
}
