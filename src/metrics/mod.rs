// Metrics module - conversion outcome aggregation
//
// Counters live in a per-instance prometheus Registry (lock-free atomics), so
// the JSON snapshot and the text exposition read the same numbers. A bounded
// history of recent outcomes backs the latency percentiles and the history
// endpoint.

pub mod outcome;
pub mod stream;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::time::Instant;

use crate::cache::{CacheStats, CacheStore};
use crate::config::MetricsConfig;
use crate::resources::{ResourceProbe, ResourceUsage, StaticProbe, SystemProbe};

pub use outcome::{ConversionOutcome, OutcomeStatus};
pub use stream::MetricsStream;

/// Render duration buckets in seconds (5ms to 60s)
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Failed requests broken down by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FailureCounts {
    pub validation_error: u64,
    pub timeout: u64,
    pub render_error: u64,
    pub rate_limited: u64,
}

impl FailureCounts {
    pub fn total(&self) -> u64 {
        self.validation_error + self.timeout + self.render_error + self.rate_limited
    }
}

/// Point-in-time view of the service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub failures: FailureCounts,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// hits / (hits + misses), 0 when the cache was never consulted
    pub cache_hit_rate: f64,
    /// Mean over all successful requests
    pub avg_duration_ms: f64,
    /// Percentiles over successful requests still in the history
    pub p50_duration_ms: f64,
    pub p95_duration_ms: f64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
    pub resources: ResourceUsage,
}

/// Folds conversion outcomes into counters and a bounded history
pub struct MetricsAggregator {
    registry: Registry,
    conversions: IntCounterVec,
    cache_lookups: IntCounterVec,
    duration: Histogram,
    bytes_in: IntCounter,
    bytes_out: IntCounter,
    history: Mutex<VecDeque<ConversionOutcome>>,
    history_size: usize,
    probe: Arc<dyn ResourceProbe>,
    cache: Option<Arc<CacheStore>>,
    started_at: Instant,
}

impl MetricsAggregator {
    /// Create an aggregator keeping the last `history_size` outcomes
    pub fn new(
        history_size: usize,
        probe: Arc<dyn ResourceProbe>,
    ) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let conversions = IntCounterVec::new(
            Opts::new(
                "pdfgate_conversions_total",
                "Conversion requests by outcome status",
            ),
            &["status"],
        )?;
        let cache_lookups = IntCounterVec::new(
            Opts::new("pdfgate_cache_lookups_total", "Cache lookups by result"),
            &["result"],
        )?;
        let duration = Histogram::with_opts(
            HistogramOpts::new(
                "pdfgate_conversion_duration_seconds",
                "Duration of successful conversions in seconds",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
        )?;
        let bytes_in = IntCounter::new("pdfgate_input_bytes_total", "HTML bytes received")?;
        let bytes_out = IntCounter::new("pdfgate_output_bytes_total", "PDF bytes returned")?;

        registry.register(Box::new(conversions.clone()))?;
        registry.register(Box::new(cache_lookups.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(bytes_in.clone()))?;
        registry.register(Box::new(bytes_out.clone()))?;

        // Export every series from the start, even at zero
        for status in OutcomeStatus::ALL {
            conversions.with_label_values(&[status.as_str()]);
        }
        cache_lookups.with_label_values(&["hit"]);
        cache_lookups.with_label_values(&["miss"]);

        Ok(Self {
            registry,
            conversions,
            cache_lookups,
            duration,
            bytes_in,
            bytes_out,
            history: Mutex::new(VecDeque::with_capacity(history_size.min(1024))),
            history_size: history_size.max(1),
            probe,
            cache: None,
            started_at: Instant::now(),
        })
    }

    /// Create an aggregator from configuration
    ///
    /// With resource monitoring off, resource figures are reported as zero.
    pub fn from_config(config: &MetricsConfig) -> Result<Self, prometheus::Error> {
        let probe: Arc<dyn ResourceProbe> = if config.resource_monitoring {
            Arc::new(SystemProbe::new())
        } else {
            Arc::new(StaticProbe::default())
        };
        Self::new(config.history_size, probe)
    }

    /// Include this store's statistics in snapshots
    pub fn with_cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Fold one outcome into the counters and history
    pub fn record(&self, outcome: ConversionOutcome) {
        self.conversions
            .with_label_values(&[outcome.status.as_str()])
            .inc();

        if outcome.cache_hit {
            self.cache_lookups.with_label_values(&["hit"]).inc();
        } else if outcome.is_cache_miss() {
            self.cache_lookups.with_label_values(&["miss"]).inc();
        }

        if outcome.status.is_success() {
            self.duration.observe(outcome.duration.as_secs_f64());
        }
        self.bytes_in.inc_by(outcome.input_size as u64);
        self.bytes_out.inc_by(outcome.output_size as u64);

        let mut history = self.history.lock();
        while history.len() >= self.history_size {
            history.pop_front();
        }
        history.push_back(outcome);
    }

    fn status_count(&self, status: OutcomeStatus) -> u64 {
        self.conversions.with_label_values(&[status.as_str()]).get()
    }

    /// Merge counters, cache statistics and a fresh resource reading
    pub fn snapshot(&self) -> MetricsSnapshot {
        let successful_requests = self.status_count(OutcomeStatus::Success);
        let failures = FailureCounts {
            validation_error: self.status_count(OutcomeStatus::ValidationError),
            timeout: self.status_count(OutcomeStatus::Timeout),
            render_error: self.status_count(OutcomeStatus::RenderError),
            rate_limited: self.status_count(OutcomeStatus::RateLimited),
        };

        let cache_hits = self.cache_lookups.with_label_values(&["hit"]).get();
        let cache_misses = self.cache_lookups.with_label_values(&["miss"]).get();
        let lookups = cache_hits + cache_misses;
        let cache_hit_rate = if lookups == 0 {
            0.0
        } else {
            cache_hits as f64 / lookups as f64
        };

        let samples = self.duration.get_sample_count();
        let avg_duration_ms = if samples == 0 {
            0.0
        } else {
            self.duration.get_sample_sum() / samples as f64 * 1000.0
        };

        let mut recent: Vec<f64> = self
            .history
            .lock()
            .iter()
            .filter(|o| o.status.is_success())
            .map(|o| o.duration.as_secs_f64() * 1000.0)
            .collect();
        recent.sort_unstable_by(f64::total_cmp);

        MetricsSnapshot {
            total_requests: successful_requests + failures.total(),
            successful_requests,
            failed_requests: failures.total(),
            failures,
            cache_hits,
            cache_misses,
            cache_hit_rate,
            avg_duration_ms,
            p50_duration_ms: percentile(&recent, 0.50),
            p95_duration_ms: percentile(&recent, 0.95),
            bytes_in: self.bytes_in.get(),
            bytes_out: self.bytes_out.get(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            timestamp: Utc::now(),
            cache: self.cache.as_ref().map(|c| c.stats()),
            resources: self.probe.current_usage(),
        }
    }

    /// The most recent `limit` outcomes, oldest first
    pub fn history(&self, limit: usize) -> Vec<ConversionOutcome> {
        let history = self.history.lock();
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    /// Outcomes currently retained
    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    /// Prometheus text exposition of the counters
    pub fn export_prometheus(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!(error = %e, "Failed to encode prometheus metrics");
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Nearest-rank percentile of an ascending slice (0 when empty)
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (sorted.len() as f64 * q).ceil() as usize;
    sorted[idx.saturating_sub(1).min(sorted.len() - 1)]
}
