//! Integration tests for RainViewerSource and RadarFeed using wiremock.
//!
//! These tests run the fetch -> normalize -> cache path against a mock HTTP server.

use std::sync::Arc;
use std::time::Duration;

use skycast_radar::{
    Clock, FrameCache, FrameMode, FrameSource, ManualClock, MemoryStore, RadarError, RadarFeed,
    RainViewerSource,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NOW: i64 = 1_700_000_000;
const MAPS_PATH: &str = "/public/weather-maps.json";

/// Helper to build a RainViewer-shaped payload
fn maps_payload(past: &[i64], nowcast: &[i64]) -> serde_json::Value {
    let frames = |times: &[i64], prefix: &str| -> Vec<serde_json::Value> {
        times
            .iter()
            .map(|t| serde_json::json!({ "time": t, "path": format!("/v2/radar/{}{}", prefix, t) }))
            .collect()
    };
    serde_json::json!({
        "version": "2.0",
        "generated": NOW,
        "host": "https://tilecache.rainviewer.com",
        "radar": {
            "past": frames(past, "p"),
            "nowcast": frames(nowcast, "n")
        },
        "satellite": { "infrared": [] }
    })
}

fn source_for(server: &MockServer, timeout: Duration) -> RainViewerSource {
    RainViewerSource::new(format!("{}{}", server.uri(), MAPS_PATH), timeout).unwrap()
}

fn feed_for(server: &MockServer, clock: &ManualClock) -> RadarFeed<RainViewerSource> {
    let clock: Arc<dyn Clock> = Arc::new(clock.clone());
    let cache = FrameCache::new(Arc::new(MemoryStore::new()), clock.clone());
    RadarFeed::new(source_for(server, Duration::from_secs(5)), cache, clock)
}

#[tokio::test]
async fn test_fetch_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MAPS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(maps_payload(&[NOW - 600], &[])))
        .mount(&mock_server)
        .await;

    let source = source_for(&mock_server, Duration::from_secs(5));
    let raw = source.fetch().await.unwrap();

    assert_eq!(raw["host"], "https://tilecache.rainviewer.com");
    assert_eq!(raw["radar"]["past"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_fetch_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MAPS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let source = source_for(&mock_server, Duration::from_secs(5));
    let err = source.fetch().await.unwrap_err();

    assert!(matches!(err, RadarError::Status(503)));
    assert!(!err.is_timeout());
}

#[tokio::test]
async fn test_fetch_timeout_is_distinct() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MAPS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(maps_payload(&[NOW - 600], &[]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let source = source_for(&mock_server, Duration::from_millis(200));
    let err = source.fetch().await.unwrap_err();

    assert!(err.is_timeout(), "expected timeout, got {:?}", err);
}

#[tokio::test]
async fn test_non_json_body_degrades_to_empty_dataset() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MAPS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&mock_server)
        .await;

    let clock = ManualClock::at_secs(NOW);
    let feed = feed_for(&mock_server, &clock);
    let dataset = feed.load(FrameMode::Past).await.unwrap();

    assert!(dataset.is_empty());
    assert_eq!(dataset.host, "");
}

#[tokio::test]
async fn test_feed_normalizes_and_caches() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MAPS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(maps_payload(
            &[NOW - 600, NOW - 1200],
            &[NOW + 600, NOW + 6000],
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let clock = ManualClock::at_secs(NOW);
    let feed = feed_for(&mock_server, &clock);

    let first = feed.load(FrameMode::Forecast).await.unwrap();
    assert_eq!(first.past_frames[0].time, NOW - 1200);
    assert_eq!(first.nowcast_frames.len(), 1);
    assert_eq!(first.frames.len(), 3);

    clock.advance(chrono::Duration::minutes(4));
    let second = feed.load(FrameMode::Forecast).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_feed_refetches_expired_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MAPS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(maps_payload(&[NOW - 600], &[NOW + 600])))
        .expect(2)
        .mount(&mock_server)
        .await;

    let clock = ManualClock::at_secs(NOW);
    let feed = feed_for(&mock_server, &clock);

    feed.load(FrameMode::Forecast).await.unwrap();
    clock.advance(chrono::Duration::seconds(301));
    feed.load(FrameMode::Forecast).await.unwrap();
}
