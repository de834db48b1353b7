// End-to-end scenarios through the pipeline with a simulated clock

use std::sync::Arc;
use std::time::Duration;

use pdfgate::convert::{ConversionRequest, Renderer};
use pdfgate::error::ConvertError;
use pdfgate::pipeline::Pipeline;

use super::test_harness::{config, StubRenderer};

fn pipeline(yaml: &str, delay: Duration) -> (Pipeline, Arc<StubRenderer>) {
    let renderer = StubRenderer::new(delay);
    let as_dyn: Arc<dyn Renderer> = renderer.clone();
    let pipeline = Pipeline::from_config(&config(yaml), as_dyn).expect("pipeline builds");
    (pipeline, renderer)
}

/// Scenario A: the same document twice is a miss, then a much faster hit
#[tokio::test(start_paused = true)]
async fn test_repeat_document_is_served_from_cache() {
    let (pipeline, renderer) = pipeline("{}", Duration::from_millis(800));
    let html = "<html><body>Hello</body></html>";

    let first = pipeline
        .submit("client-a", ConversionRequest::new(html))
        .await
        .unwrap();
    let second = pipeline
        .submit("client-a", ConversionRequest::new(html))
        .await
        .unwrap();

    assert!(!first.cache_hit);
    assert!(second.cache_hit);
    assert!(first.duration >= Duration::from_millis(800));
    assert!(second.duration * 10 <= first.duration);
    assert_eq!(first.pdf, second.pdf);
    assert_eq!(renderer.calls(), 1);
    assert_eq!(renderer.reclaims.load(std::sync::atomic::Ordering::SeqCst), 1);
}

/// Scenario B: an 11 MB document against a 10 MB limit
#[tokio::test]
async fn test_oversized_document_never_reaches_renderer() {
    let (pipeline, renderer) = pipeline(
        "conversion:\n  max_html_bytes: 10485760\n",
        Duration::ZERO,
    );
    let html = "a".repeat(11 * 1024 * 1024);

    let err = pipeline
        .submit("client-b", ConversionRequest::new(html))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ConvertError::Validation {
            size: 11534336,
            limit: 10485760
        }
    ));
    assert_eq!(renderer.calls(), 0);

    let snapshot = pipeline.metrics().snapshot();
    assert_eq!(snapshot.total_requests, 1);
    assert_eq!(snapshot.failed_requests, 1);
    assert_eq!(snapshot.failures.validation_error, 1);
    assert_eq!(snapshot.cache_misses, 0);
}

/// Scenario C: 61 requests in 10 seconds against 60 per window
#[tokio::test(start_paused = true)]
async fn test_sixty_first_request_in_window_is_rejected() {
    let (pipeline, _) = pipeline(
        "rate_limit:\n  requests_per_window: 60\n  window_seconds: 60\n",
        Duration::ZERO,
    );

    let mut admitted = 0;
    let mut rejected = 0;
    for i in 0..61 {
        match pipeline
            .submit("client-c", ConversionRequest::new(format!("<p>{}</p>", i)))
            .await
        {
            Ok(_) => admitted += 1,
            Err(ConvertError::RateLimited { client_id, .. }) => {
                assert_eq!(client_id, "client-c");
                rejected += 1;
            }
            Err(other) => panic!("unexpected error: {}", other),
        }
        tokio::time::advance(Duration::from_millis(160)).await;
    }

    assert_eq!(admitted, 60);
    assert_eq!(rejected, 1);
    assert_eq!(pipeline.metrics().snapshot().failures.rate_limited, 1);

    // Once the window has fully elapsed, admission resumes
    tokio::time::advance(Duration::from_secs(60)).await;
    assert!(pipeline
        .submit("client-c", ConversionRequest::new("<p>later</p>"))
        .await
        .is_ok());
}

/// Scenario D: three renders and one cache hit
#[tokio::test]
async fn test_hit_rate_over_cache_eligible_requests() {
    let (pipeline, _) = pipeline("{}", Duration::ZERO);

    for html in ["<p>1</p>", "<p>2</p>", "<p>3</p>", "<p>1</p>"] {
        pipeline
            .submit("client-d", ConversionRequest::new(html))
            .await
            .unwrap();
    }

    let snapshot = pipeline.metrics().snapshot();
    assert_eq!(snapshot.total_requests, 4);
    assert_eq!(snapshot.successful_requests, 4);
    assert_eq!(snapshot.cache_hits, 1);
    assert_eq!(snapshot.cache_misses, 3);
    assert_eq!(snapshot.cache_hit_rate, 0.25);
}

#[tokio::test(start_paused = true)]
async fn test_slow_render_times_out_at_bound() {
    let (pipeline, _) = pipeline(
        "conversion:\n  render_timeout_seconds: 5\n",
        Duration::from_secs(120),
    );

    let started = tokio::time::Instant::now();
    let err = pipeline
        .submit("client-e", ConversionRequest::new("<p>slow</p>"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ConvertError::Timeout {
            timeout: Duration::from_secs(5)
        }
    );
    assert_eq!(started.elapsed(), Duration::from_secs(5));
    assert_eq!(pipeline.cache().stats().entry_count, 0);
    assert_eq!(pipeline.metrics().snapshot().failures.timeout, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cached_entry_expires_after_ttl() {
    let (pipeline, renderer) = pipeline("cache:\n  ttl_seconds: 30\n", Duration::ZERO);
    let request = || ConversionRequest::new("<p>ttl</p>");

    pipeline.submit("c", request()).await.unwrap();
    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(pipeline.submit("c", request()).await.unwrap().cache_hit);

    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(!pipeline.submit("c", request()).await.unwrap().cache_hit);
    assert_eq!(renderer.calls(), 2);
}
