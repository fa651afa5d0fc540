use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{parse_body, ApiError, AppState};
use crate::storage::{Feed, FeedPriority, FeedStatus, FeedSubmission, FeedType};

/// `GET /feeds` body.
#[derive(Debug, Serialize)]
pub struct FeedGroups {
    pub core: Vec<Feed>,
    pub extended: Vec<Feed>,
    pub low: Vec<Feed>,
    pub publisher: Vec<Feed>,
    pub all: Vec<Feed>,
    pub total: usize,
    pub timestamp: String,
}

impl FeedGroups {
    fn from_feeds(all: Vec<Feed>) -> Self {
        let mut groups = Self {
            core: Vec::new(),
            extended: Vec::new(),
            low: Vec::new(),
            publisher: Vec::new(),
            total: all.len(),
            all: Vec::new(),
            timestamp: Utc::now().to_rfc3339(),
        };

        for feed in &all {
            let bucket = match (feed.feed_type, feed.priority) {
                (FeedType::Publisher, _) => &mut groups.publisher,
                (FeedType::Album, FeedPriority::Core) => &mut groups.core,
                (FeedType::Album, FeedPriority::Extended) => &mut groups.extended,
                (FeedType::Album, FeedPriority::Low) => &mut groups.low,
            };
            bucket.push(feed.clone());
        }
        groups.all = all;
        groups
    }
}

pub(super) async fn list(State(state): State<AppState>) -> Result<Response, ApiError> {
    let feeds = state.store.list_active().await?;
    let groups = FeedGroups::from_feeds(feeds);

    let cache_control = format!("public, max-age={}", state.settings.feeds_max_age_secs);
    let mut response = Json(groups).into_response();
    if let Ok(value) = HeaderValue::from_str(&cache_control) {
        response.headers_mut().insert(header::CACHE_CONTROL, value);
    }
    Ok(response)
}

pub(super) async fn create(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Feed>), ApiError> {
    let submission: FeedSubmission = parse_body(&body)?;
    if submission.url().trim().is_empty() {
        return Err(ApiError::BadRequest("url is required".into()));
    }

    let feed = state.store.add_submission(&submission).await?;
    Ok((StatusCode::CREATED, Json(feed)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedUpdate {
    #[serde(default)]
    feed_id: Option<String>,
    #[serde(default)]
    status: Option<FeedStatus>,
    #[serde(default)]
    priority: Option<FeedPriority>,
}

pub(super) async fn update(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Feed>, ApiError> {
    let update: FeedUpdate = parse_body(&body)?;
    let feed_id = required_feed_id(update.feed_id)?;

    if update.status.is_none() && update.priority.is_none() {
        return Err(ApiError::BadRequest(
            "Nothing to update: provide status or priority".into(),
        ));
    }
    let feed = state
        .store
        .update(&feed_id, update.status, update.priority)
        .await?;

    Ok(Json(feed))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedRemoval {
    #[serde(default)]
    feed_id: Option<String>,
}

pub(super) async fn remove(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let removal: FeedRemoval = parse_body(&body)?;
    let feed_id = required_feed_id(removal.feed_id)?;

    state.store.remove(&feed_id).await?;
    Ok(Json(serde_json::json!({ "success": true, "feedId": feed_id })))
}

fn required_feed_id(feed_id: Option<String>) -> Result<String, ApiError> {
    feed_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("feedId is required".into()))
}
