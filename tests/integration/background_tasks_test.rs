// Metrics stream and sweeper running inside a started server

use serde_json::json;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;

use super::test_harness::TestApp;

const YAML: &str = r#"
cache:
  ttl_seconds: 20
metrics:
  stream_interval_seconds: 1
sweeper:
  interval_seconds: 30
rate_limit:
  window_seconds: 10
"#;

#[tokio::test(start_paused = true)]
async fn test_stream_pushes_fresh_snapshots() {
    let app = TestApp::start(YAML, Duration::ZERO);
    let mut updates = app.server.state().stream().subscribe();

    app.convert("10.1.1.1", json!({ "html": "<p>stream</p>" }))
        .await;

    // Skip anything queued before the request was recorded
    let mut latest = updates.recv().await.unwrap();
    while latest.total_requests == 0 {
        latest = updates.recv().await.unwrap();
    }
    assert_eq!(latest.total_requests, 1);
    assert_eq!(latest.cache_misses, 1);
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_purges_idle_state() {
    let app = TestApp::start(YAML, Duration::ZERO);
    app.convert("10.2.2.2", json!({ "html": "<p>sweep</p>" }))
        .await;

    let pipeline = app.server.state().pipeline();
    assert_eq!(pipeline.rate_limiter().tracked_client_count(), 1);
    let reclaims_before = app
        .renderer
        .reclaims
        .load(std::sync::atomic::Ordering::SeqCst);

    tokio::time::sleep(Duration::from_secs(31)).await;

    assert_eq!(pipeline.rate_limiter().tracked_client_count(), 0);
    let stats = pipeline.cache().stats();
    assert_eq!(stats.entry_count, 0);
    assert_eq!(stats.expirations, 1);
    assert!(
        app.renderer
            .reclaims
            .load(std::sync::atomic::Ordering::SeqCst)
            > reclaims_before
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_background_tasks() {
    let app = TestApp::start(YAML, Duration::ZERO);
    let stream = app.server.state().stream().clone();
    let mut updates = stream.subscribe();
    updates.recv().await.unwrap();

    app.server.shutdown();
    assert!(!stream.is_running());

    // Let the stream task observe the shutdown, then no further ticks arrive
    tokio::time::sleep(Duration::from_millis(10)).await;
    while updates.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(matches!(updates.try_recv(), Err(TryRecvError::Empty)));
}
