// Sliding window rate limiter

use std::time::Duration;

use pdfgate::config::RateLimitConfig;
use pdfgate::rate_limit::{RateLimitError, RateLimitManager};

const WINDOW: Duration = Duration::from_secs(60);

#[tokio::test(start_paused = true)]
async fn test_limit_is_inclusive_and_next_request_rejected() {
    let limiter = RateLimitManager::new(3, WINDOW, None);

    for _ in 0..3 {
        assert!(limiter.check("10.0.0.1").is_ok());
    }

    match limiter.check("10.0.0.1") {
        Err(RateLimitError::PerClient {
            client_id,
            retry_after,
        }) => {
            assert_eq!(client_id, "10.0.0.1");
            assert_eq!(retry_after, WINDOW);
        }
        other => panic!("expected per-client rejection, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_window_slides_one_request_at_a_time() {
    let limiter = RateLimitManager::new(2, WINDOW, None);

    assert!(limiter.admit("c"));
    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(limiter.admit("c"));
    assert!(!limiter.admit("c"));

    // The first request leaves the window, the second is still in it
    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(limiter.admit("c"));
    assert!(!limiter.admit("c"));

    let retry = limiter.check("c").unwrap_err().retry_after();
    assert_eq!(retry, Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_rejections_do_not_extend_the_window() {
    let limiter = RateLimitManager::new(1, WINDOW, None);

    assert!(limiter.admit("c"));
    for _ in 0..10 {
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(!limiter.admit("c"));
    }

    tokio::time::advance(Duration::from_secs(10)).await;
    assert!(limiter.admit("c"));
}

#[tokio::test(start_paused = true)]
async fn test_clients_are_isolated() {
    let limiter = RateLimitManager::new(1, WINDOW, None);

    assert!(limiter.admit("a"));
    assert!(!limiter.admit("a"));
    assert!(limiter.admit("b"));
    assert_eq!(limiter.tracked_client_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_forgets_idle_clients() {
    let limiter = RateLimitManager::new(5, WINDOW, None);
    limiter.admit("old");
    tokio::time::advance(Duration::from_secs(45)).await;
    limiter.admit("recent");

    tokio::time::advance(Duration::from_secs(20)).await;

    assert_eq!(limiter.sweep(), 1);
    assert_eq!(limiter.tracked_client_count(), 1);
}

#[test]
fn test_rejected_client_cannot_starve_others_of_global_quota() {
    let limiter = RateLimitManager::new(2, WINDOW, Some(3));

    assert!(limiter.admit("noisy"));
    assert!(limiter.admit("noisy"));
    for _ in 0..50 {
        assert!(matches!(
            limiter.check("noisy"),
            Err(RateLimitError::PerClient { .. })
        ));
    }

    assert!(limiter.check("quiet").is_ok());
}

#[test]
fn test_global_ceiling_caps_all_clients() {
    let limiter = RateLimitManager::new(100, WINDOW, Some(2));

    assert!(limiter.check("a").is_ok());
    assert!(limiter.check("b").is_ok());
    let err = limiter.check("c").unwrap_err();
    assert_eq!(err, RateLimitError::Global);
    assert_eq!(err.retry_after(), Duration::from_secs(1));
}

#[test]
fn test_disabled_config_admits_everything() {
    let limiter = RateLimitManager::from_config(&RateLimitConfig {
        enabled: false,
        ..RateLimitConfig::default()
    });

    assert!(!limiter.is_enabled());
    assert!((0..1000).all(|_| limiter.admit("flood")));
    assert_eq!(limiter.tracked_client_count(), 0);
}
