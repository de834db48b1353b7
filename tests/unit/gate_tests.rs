// Conversion gate against a mocked renderer

use async_trait::async_trait;
use bytes::Bytes;
use mockall::mock;
use mockall::predicate::eq;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

use pdfgate::cache::CacheStore;
use pdfgate::config::ConversionConfig;
use pdfgate::convert::{ConversionGate, ConversionRequest, RenderError, Renderer};
use pdfgate::error::ConvertError;
use pdfgate::metrics::MetricsAggregator;
use pdfgate::resources::StaticProbe;

mock! {
    pub Engine {}

    #[async_trait]
    impl Renderer for Engine {
        async fn render(&self, html: String) -> Result<Bytes, RenderError>;
        fn reclaim(&self);
    }
}

struct Fixture {
    gate: ConversionGate,
    cache: Arc<CacheStore>,
    metrics: Arc<MetricsAggregator>,
}

fn fixture(engine: MockEngine, max_html_bytes: usize) -> Fixture {
    let cache = Arc::new(CacheStore::new(10, Duration::from_secs(60)));
    let metrics = Arc::new(
        MetricsAggregator::new(100, Arc::new(StaticProbe::default()))
            .unwrap()
            .with_cache(Arc::clone(&cache)),
    );
    let config = ConversionConfig {
        max_html_bytes,
        ..ConversionConfig::default()
    };
    let gate = ConversionGate::new(
        Arc::new(engine),
        Arc::clone(&cache),
        Arc::clone(&metrics),
        &config,
    );
    Fixture {
        gate,
        cache,
        metrics,
    }
}

#[tokio::test]
async fn test_oversized_input_never_reaches_renderer() {
    let mut engine = MockEngine::new();
    engine.expect_render().times(0);
    engine.expect_reclaim().times(0);
    let f = fixture(engine, 16);

    let err = assert_err!(f.gate.convert(ConversionRequest::new("x".repeat(16))).await);

    assert_eq!(err, ConvertError::Validation { size: 16, limit: 16 });
    assert_eq!(f.metrics.snapshot().failures.validation_error, 1);
    assert_eq!(f.cache.stats().misses, 0);
}

#[tokio::test]
async fn test_render_miss_then_hit_calls_engine_once() {
    let mut engine = MockEngine::new();
    engine
        .expect_render()
        .with(eq("<p>once</p>".to_string()))
        .times(1)
        .returning(|_| Ok(Bytes::from_static(b"%PDF-1.7 once")));
    engine.expect_reclaim().times(1).return_const(());
    let f = fixture(engine, 1024);

    let first = assert_ok!(f.gate.convert(ConversionRequest::new("<p>once</p>")).await);
    let second = assert_ok!(f.gate.convert(ConversionRequest::new("<p>once</p>")).await);

    assert!(!first.cache_hit);
    assert!(second.cache_hit);
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(second.pdf, Bytes::from_static(b"%PDF-1.7 once"));

    let snapshot = f.metrics.snapshot();
    assert_eq!(snapshot.cache_hits, 1);
    assert_eq!(snapshot.cache_misses, 1);
    assert_eq!(snapshot.bytes_out, 26);
}

#[tokio::test]
async fn test_bypassing_cache_leaves_store_untouched() {
    let mut engine = MockEngine::new();
    engine
        .expect_render()
        .times(2)
        .returning(|html| Ok(Bytes::from(html)));
    engine.expect_reclaim().times(2).return_const(());
    let f = fixture(engine, 1024);

    for _ in 0..2 {
        let converted = assert_ok!(
            f.gate
                .convert(ConversionRequest::new("<p>fresh</p>").without_cache())
                .await
        );
        assert!(converted.fingerprint.is_none());
    }

    assert_eq!(f.cache.stats().entry_count, 0);
    let snapshot = f.metrics.snapshot();
    assert_eq!(snapshot.cache_hits + snapshot.cache_misses, 0);
    assert_eq!(snapshot.cache_hit_rate, 0.0);
}

#[tokio::test]
async fn test_renderer_failure_is_not_cached() {
    let mut engine = MockEngine::new();
    engine
        .expect_render()
        .times(2)
        .returning(|_| Err(RenderError::Engine("font missing".to_string())));
    engine.expect_reclaim().times(0);
    let f = fixture(engine, 1024);

    for _ in 0..2 {
        let err = assert_err!(f.gate.convert(ConversionRequest::new("<p>bad</p>")).await);
        assert_eq!(err, ConvertError::Render("font missing".to_string()));
    }

    assert_eq!(f.cache.stats().entry_count, 0);
    let snapshot = f.metrics.snapshot();
    assert_eq!(snapshot.failures.render_error, 2);
    assert_eq!(snapshot.successful_requests, 0);
    assert_eq!(f.gate.available_permits(), 4);
}
