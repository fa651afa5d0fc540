//! Integration tests for an ingestion pass: store → fetch → parse → snapshot.

use chrono::Utc;
use pretty_assertions::assert_eq;
use wiremock::matchers::path;
use wiremock::{Mock, MockServer, ResponseTemplate};

use tunefeed::feed::{
    FeedFetcher, FetcherConfig, IngestStage, Ingestor, ParseCache, Snapshot,
};
use tunefeed::storage::{FeedStore, FeedType};
use tunefeed::util::HostPolicy;

const ALBUM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd"
     xmlns:podcast="https://podcastindex.org/namespace/1.0">
<channel>
  <title>Harbor Lights</title>
  <itunes:author>The Tides</itunes:author>
  <podcast:medium>music</podcast:medium>
  <podcast:guid>917393e3-1b1e-5cef-ace4-edaa54e1f810</podcast:guid>
  <podcast:publisher>
    <podcast:remoteItem medium="publisher" feedGuid="label-guid" feedUrl="https://label.example.com/rss"/>
  </podcast:publisher>
  <item><title>Low Tide</title><podcast:episode>2</podcast:episode>
    <enclosure url="https://cdn.example.com/2.mp3" type="audio/mpeg"/></item>
  <item><title>High Tide</title><podcast:episode>1</podcast:episode>
    <enclosure url="https://cdn.example.com/1.mp3" type="audio/mpeg"/></item>
</channel></rss>"#;

const PUBLISHER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:podcast="https://podcastindex.org/namespace/1.0">
<channel>
  <title>Tide Records</title>
  <podcast:medium>publisher</podcast:medium>
  <podcast:remoteItem medium="music" feedGuid="917393e3-1b1e-5cef-ace4-edaa54e1f810"/>
  <podcast:remoteItem medium="music" feedUrl="https://no-guid.example.com/rss"/>
</channel></rss>"#;

async fn store() -> FeedStore {
    FeedStore::open(":memory:")
        .await
        .unwrap()
        .with_host_policy(HostPolicy::AllowPrivate)
}

fn ingestor() -> Ingestor {
    Ingestor::new(
        FeedFetcher::new(FetcherConfig::default()).unwrap(),
        ParseCache::new(16),
        3,
    )
}

#[tokio::test]
async fn test_pass_over_store_writes_snapshot() {
    let server = MockServer::start().await;
    Mock::given(path("/album"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ALBUM))
        .mount(&server)
        .await;
    Mock::given(path("/label"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PUBLISHER))
        .mount(&server)
        .await;
    Mock::given(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    Mock::given(path("/html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body/></html>"))
        .mount(&server)
        .await;

    let store = store().await;
    for (name, feed_type) in [
        ("album", FeedType::Album),
        ("gone", FeedType::Album),
        ("label", FeedType::Publisher),
        ("html", FeedType::Album),
    ] {
        store
            .add(&format!("{}/{name}", server.uri()), feed_type, None)
            .await
            .unwrap();
    }

    let feeds = store.list_active().await.unwrap();
    let report = ingestor().ingest(&feeds).await;

    assert_eq!(report.records.len() + report.failures.len(), feeds.len());
    let album = report.albums().next().unwrap();
    assert_eq!(album.id, "harbor-lights");
    assert_eq!(album.record.artist, "The Tides");
    let titles: Vec<_> = album.record.tracks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["High Tide", "Low Tide"]);
    assert_eq!(
        album.record.publisher.as_ref().map(|p| p.feed_guid.as_str()),
        Some("label-guid")
    );

    let publisher = report.publishers().next().unwrap();
    assert_eq!(publisher.title, "Tide Records");
    assert_eq!(publisher.publisher_items.len(), 1);

    let stages: Vec<_> = report.failures.iter().map(|f| (f.stage, f.kind.as_str())).collect();
    assert_eq!(
        stages,
        vec![(IngestStage::Fetch, "http_status"), (IngestStage::Parse, "not_a_feed")]
    );

    let dir = std::env::temp_dir().join("tunefeed_ingestion_snapshot");
    std::fs::remove_dir_all(&dir).ok();
    let snapshot_path = dir.join("snapshot.json");

    let snapshot = Snapshot::from_report(report, Utc::now());
    snapshot.write_atomic(&snapshot_path).unwrap();
    let loaded = Snapshot::read(&snapshot_path).unwrap().unwrap();
    assert_eq!(loaded.albums.len(), 1);
    assert_eq!(loaded.publishers.len(), 1);
    assert_eq!(loaded.failures.len(), 2);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_unchanged_documents_parse_once() {
    let server = MockServer::start().await;
    Mock::given(path("/album"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ALBUM))
        .expect(2)
        .mount(&server)
        .await;

    let store = store().await;
    store
        .add(&format!("{}/album", server.uri()), FeedType::Album, None)
        .await
        .unwrap();
    let feeds = store.list_active().await.unwrap();

    let cache = ParseCache::new(16);
    let ingestor = Ingestor::new(
        FeedFetcher::new(FetcherConfig::default()).unwrap(),
        cache.clone(),
        1,
    );

    let first = ingestor.ingest(&feeds).await;
    let second = ingestor.ingest(&feeds).await;
    assert_eq!(cache.len(), 1);
    assert_eq!(
        first.albums().next().map(|a| &a.record),
        second.albums().next().map(|a| &a.record)
    );
}
