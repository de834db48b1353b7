// Configuration loading and validation

use rstest::rstest;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

use pdfgate::config::*;

#[test]
fn test_empty_document_yields_defaults() {
    let config = Config::from_yaml_with_env("{}").expect("empty config parses");

    assert_eq!(config.server.listen_addr(), "0.0.0.0:8000");
    assert!(config.cache.enabled);
    assert_eq!(config.cache.max_entries, 100);
    assert_eq!(config.cache.ttl(), Duration::from_secs(3600));
    assert_eq!(config.conversion.max_html_bytes, 10 * 1024 * 1024);
    assert_eq!(config.conversion.render_timeout(), Duration::from_secs(30));
    assert_eq!(config.rate_limit.requests_per_window, 60);
    assert_eq!(config.rate_limit.window(), Duration::from_secs(60));
    assert_eq!(config.metrics.history_size, 1000);
    assert_eq!(config.sweeper.interval(), Duration::from_secs(300));
    assert!(config.validate().is_ok());
}

#[test]
fn test_can_load_full_config_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
server:
  address: "127.0.0.1"
  port: 9090
logging:
  level: debug
  format: pretty
cache:
  max_entries: 10
  ttl_seconds: 60
conversion:
  max_html_bytes: 2048
  render_timeout_seconds: 5
  max_concurrent_renders: 2
  renderer:
    command: wkhtmltopdf
    args: ["-", "-"]
rate_limit:
  requests_per_window: 5
  window_seconds: 10
  global_requests_per_second: 100
metrics:
  history_size: 50
  stream_interval_seconds: 2
sweeper:
  interval_seconds: 30
  reclaim_memory: false
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).expect("file config parses");

    assert_eq!(config.server.listen_addr(), "127.0.0.1:9090");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, LogFormat::Pretty);
    assert_eq!(config.cache.max_entries, 10);
    assert_eq!(config.conversion.max_concurrent_renders, 2);
    assert_eq!(config.conversion.renderer.command, "wkhtmltopdf");
    assert_eq!(config.rate_limit.global_requests_per_second, Some(100));
    assert_eq!(config.metrics.stream_interval(), Duration::from_secs(2));
    assert!(!config.sweeper.reclaim_memory);
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_file_is_read_error() {
    let err = Config::from_file("/nonexistent/pdfgate.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
    assert!(err.to_string().contains("/nonexistent/pdfgate.yaml"));
}

#[test]
fn test_unknown_field_is_parse_error() {
    let err = Config::from_yaml_with_env("cache:\n  max_size: 10\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[rstest]
#[case::cache_entries("cache:\n  max_entries: 0\n", "cache.max_entries")]
#[case::cache_ttl("cache:\n  ttl_seconds: 0\n", "cache.ttl_seconds")]
#[case::html_limit("conversion:\n  max_html_bytes: 0\n", "conversion.max_html_bytes")]
#[case::timeout("conversion:\n  render_timeout_seconds: 0\n", "conversion.render_timeout_seconds")]
#[case::renders("conversion:\n  max_concurrent_renders: 0\n", "conversion.max_concurrent_renders")]
#[case::window("rate_limit:\n  window_seconds: 0\n", "rate_limit.window_seconds")]
#[case::history("metrics:\n  history_size: 0\n", "metrics.history_size")]
#[case::sweep("sweeper:\n  interval_seconds: 0\n", "sweeper.interval_seconds")]
fn test_zero_values_are_rejected(#[case] yaml: &str, #[case] field: &str) {
    let config = Config::from_yaml_with_env(yaml).expect("shape is valid");
    match config.validate() {
        Err(ConfigError::Invalid(message)) => assert!(message.contains(field), "{}", message),
        other => panic!("expected invalid config, got {:?}", other),
    }
}

#[rstest]
#[case::cache_ttl("cache:\n  ttl_seconds: 18446744073709551615\n", "cache.ttl_seconds")]
#[case::window("rate_limit:\n  window_seconds: 315360001\n", "rate_limit.window_seconds")]
#[case::sweep("sweeper:\n  interval_seconds: 18446744073709551615\n", "sweeper.interval_seconds")]
#[case::stream("metrics:\n  stream_interval_seconds: 315360001\n", "metrics.stream_interval_seconds")]
#[case::timeout("conversion:\n  render_timeout_seconds: 315360001\n", "conversion.render_timeout_seconds")]
fn test_durations_beyond_ten_years_are_rejected(#[case] yaml: &str, #[case] field: &str) {
    let config = Config::from_yaml_with_env(yaml).expect("shape is valid");
    match config.validate() {
        Err(ConfigError::Invalid(message)) => {
            assert!(message.contains(field), "{}", message);
            assert!(message.contains("at most"), "{}", message);
        }
        other => panic!("expected invalid config, got {:?}", other),
    }
}

#[test]
fn test_ten_year_durations_are_accepted() {
    let yaml = format!(
        "cache:\n  ttl_seconds: {max}\nrate_limit:\n  window_seconds: {max}\nsweeper:\n  interval_seconds: {max}\n",
        max = pdfgate::constants::MAX_DURATION_SECS
    );
    let config = Config::from_yaml_with_env(&yaml).unwrap();
    assert!(config.validate().is_ok());
}

#[test]
fn test_disabled_rate_limit_skips_validation() {
    let config = Config::from_yaml_with_env(
        "rate_limit:\n  enabled: false\n  requests_per_window: 0\n",
    )
    .unwrap();
    assert!(config.validate().is_ok());
}
