//! End-to-end tests of the HTTP API against an in-memory store and mocked
//! upstream feeds.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::PathBuf;
use tower::ServiceExt;
use wiremock::matchers::path;
use wiremock::{Mock, MockServer, ResponseTemplate};

use tunefeed::api::{router, ApiSettings, AppState};
use tunefeed::config::AlbumsSource;
use tunefeed::feed::{FeedFetcher, FetcherConfig, IngestReport, Ingestor, ParseCache, Snapshot};
use tunefeed::storage::{FeedStore, FeedType};
use tunefeed::util::HostPolicy;

fn album_rss(title: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
<channel>
  <title>{title}</title>
  <itunes:author>Test Artist</itunes:author>
  <item><title>Track</title><itunes:duration>3:00</itunes:duration>
    <enclosure url="https://cdn.example.com/track.mp3" type="audio/mpeg"/></item>
</channel></rss>"#
    )
}

struct TestApp {
    app: Router,
    store: FeedStore,
    snapshot_path: PathBuf,
}

async fn test_app(name: &str, albums_source: AlbumsSource) -> TestApp {
    let store = FeedStore::open(":memory:")
        .await
        .unwrap()
        .with_host_policy(HostPolicy::AllowPrivate);
    let ingestor = Ingestor::new(
        FeedFetcher::new(FetcherConfig::default()).unwrap(),
        ParseCache::default(),
        4,
    );

    let dir = std::env::temp_dir().join(format!("tunefeed_api_test_{name}"));
    std::fs::remove_dir_all(&dir).ok();
    std::fs::create_dir_all(&dir).unwrap();
    let snapshot_path = dir.join("snapshot.json");

    let settings = ApiSettings {
        snapshot_path: snapshot_path.clone(),
        albums_source,
        feeds_max_age_secs: 600,
    };
    TestApp {
        app: router(AppState::new(store.clone(), ingestor, settings)),
        store,
        snapshot_path,
    }
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

// ============================================================================
// /feeds
// ============================================================================

#[tokio::test]
async fn test_create_list_update_delete() {
    let t = test_app("crud", AlbumsSource::Live).await;

    let (status, created) = send(
        &t.app,
        Method::POST,
        "/feeds",
        Some(json!({ "url": "https://example.com/feed.xml", "type": "album", "priority": "extended" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["id"], "example-com-feed-xml");
    assert_eq!(created["originalUrl"], "https://example.com/feed.xml");
    assert_eq!(created["priority"], "extended");
    assert_eq!(created["status"], "active");

    let (status, _) = send(
        &t.app,
        Method::POST,
        "/feeds",
        Some(json!({ "url": "https://label.example.com/rss", "type": "publisher", "title": "Label" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, groups) = send(&t.app, Method::GET, "/feeds", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(groups["total"], 2);
    assert_eq!(groups["extended"].as_array().unwrap().len(), 1);
    assert_eq!(groups["publisher"][0]["title"], "Label");
    assert_eq!(groups["core"], json!([]));

    let (status, updated) = send(
        &t.app,
        Method::PATCH,
        "/feeds",
        Some(json!({ "feedId": "example-com-feed-xml", "status": "inactive", "priority": "low" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "inactive");
    assert_eq!(updated["priority"], "low");

    let (_, groups) = send(&t.app, Method::GET, "/feeds", None).await;
    assert_eq!(groups["total"], 1, "inactive feeds are not listed");

    let (status, removed) = send(
        &t.app,
        Method::DELETE,
        "/feeds",
        Some(json!({ "feedId": "example-com-feed-xml" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed, json!({ "success": true, "feedId": "example-com-feed-xml" }));
    assert_eq!(t.store.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_feeds_cache_control() {
    let t = test_app("cache_control", AlbumsSource::Live).await;
    let response = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/feeds").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=600"
    );
}

#[tokio::test]
async fn test_create_errors() {
    let t = test_app("create_errors", AlbumsSource::Live).await;
    let feed = json!({ "url": "https://example.com/feed.xml", "type": "album" });

    let (status, _) = send(&t.app, Method::POST, "/feeds", Some(feed.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&t.app, Method::POST, "/feeds", Some(feed)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "duplicate");

    let cases = [
        json!({ "url": "https://x.example.com/rss", "type": "podcast" }),
        json!({ "url": "https://x.example.com/rss" }),
        json!({ "type": "album" }),
        json!({ "url": "", "type": "album" }),
        json!({ "url": "not a url", "type": "album" }),
        json!({ "url": "ftp://x.example.com/rss", "type": "album" }),
    ];
    for case in cases {
        let (status, body) = send(&t.app, Method::POST, "/feeds", Some(case.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{case}");
        assert_eq!(body["kind"], "validation", "{case}");
    }
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let t = test_app("malformed", AlbumsSource::Live).await;
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/feeds")
                .body(Body::from("{ not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_errors() {
    let t = test_app("delete_errors", AlbumsSource::Live).await;

    let (status, body) = send(&t.app, Method::DELETE, "/feeds", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "feedId is required");

    let (status, body) = send(&t.app, Method::DELETE, "/feeds", Some(json!({ "feedId": "nope" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn test_patch_errors() {
    let t = test_app("patch_errors", AlbumsSource::Live).await;

    let (status, _) = send(&t.app, Method::PATCH, "/feeds", Some(json!({ "status": "inactive" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&t.app, Method::PATCH, "/feeds", Some(json!({ "feedId": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &t.app,
        Method::PATCH,
        "/feeds",
        Some(json!({ "feedId": "x", "status": "paused" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &t.app,
        Method::PATCH,
        "/feeds",
        Some(json!({ "feedId": "x", "status": "inactive" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// /albums, /publishers, /health
// ============================================================================

#[tokio::test]
async fn test_albums_live_skips_failing_feeds() {
    let server = MockServer::start().await;
    Mock::given(path("/one"))
        .respond_with(ResponseTemplate::new(200).set_body_string(album_rss("First Light")))
        .mount(&server)
        .await;
    Mock::given(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(path("/two"))
        .respond_with(ResponseTemplate::new(200).set_body_string(album_rss("Second Wind")))
        .mount(&server)
        .await;

    let t = test_app("albums_live", AlbumsSource::Live).await;
    for name in ["one", "broken", "two"] {
        let (status, _) = send(
            &t.app,
            Method::POST,
            "/feeds",
            Some(json!({ "url": format!("{}/{name}", server.uri()), "type": "album" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&t.app, Method::GET, "/albums", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["albums"][0]["id"], "first-light");
    assert_eq!(body["albums"][0]["artist"], "Test Artist");
    assert_eq!(body["albums"][0]["tracks"][0]["duration"], 180);
    assert_eq!(body["albums"][1]["title"], "Second Wind");
    assert_eq!(body["albums"][1]["feedUrl"], format!("{}/two", server.uri()));
}

#[tokio::test]
async fn test_albums_live_excludes_publisher_documents() {
    let server = MockServer::start().await;
    Mock::given(path("/album"))
        .respond_with(ResponseTemplate::new(200).set_body_string(album_rss("Only Album")))
        .mount(&server)
        .await;
    Mock::given(path("/label"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<rss version="2.0" xmlns:podcast="https://podcastindex.org/namespace/1.0"><channel>
               <title>Label</title><podcast:medium>publisher</podcast:medium>
               <podcast:remoteItem feedGuid="g1"/></channel></rss>"#,
        ))
        .mount(&server)
        .await;

    let t = test_app("albums_mismatch", AlbumsSource::Live).await;
    for name in ["album", "label"] {
        t.store
            .add(&format!("{}/{name}", server.uri()), FeedType::Album, None)
            .await
            .unwrap();
    }

    let (status, body) = send(&t.app, Method::GET, "/albums", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["albums"][0]["title"], "Only Album");
}

#[tokio::test]
async fn test_albums_and_publishers_from_snapshot() {
    let t = test_app("snapshot", AlbumsSource::Snapshot).await;

    let (status, body) = send(&t.app, Method::GET, "/publishers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0, "missing snapshot serves an empty list");

    let (_, body) = send(&t.app, Method::GET, "/albums", None).await;
    assert_eq!(body["albums"], json!([]));

    Snapshot::from_report(IngestReport::default(), Utc::now())
        .write_atomic(&t.snapshot_path)
        .unwrap();
    let (status, body) = send(&t.app, Method::GET, "/publishers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["publishers"], json!([]));

    std::fs::write(&t.snapshot_path, b"garbage").unwrap();
    let (status, body) = send(&t.app, Method::GET, "/publishers", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "snapshot");
}

#[tokio::test]
async fn test_health() {
    let t = test_app("health", AlbumsSource::Live).await;
    let (status, body) = send(&t.app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}
