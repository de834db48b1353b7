// Pipeline module - admission control in front of the conversion gate
//
// Owns one instance of each stateful component. The server and the sweeper
// reach them through the pipeline, so tests can build several independent
// pipelines in one process.

use std::sync::Arc;
use tokio::time::Instant;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::convert::{ConversionGate, ConversionRequest, Converted, Renderer};
use crate::error::ConvertError;
use crate::metrics::{ConversionOutcome, MetricsAggregator};
use crate::rate_limit::RateLimitManager;

pub struct Pipeline {
    rate_limiter: Arc<RateLimitManager>,
    gate: Arc<ConversionGate>,
    cache: Arc<CacheStore>,
    metrics: Arc<MetricsAggregator>,
}

impl Pipeline {
    pub fn new(
        rate_limiter: Arc<RateLimitManager>,
        gate: Arc<ConversionGate>,
        cache: Arc<CacheStore>,
        metrics: Arc<MetricsAggregator>,
    ) -> Self {
        Self {
            rate_limiter,
            gate,
            cache,
            metrics,
        }
    }

    /// Wire every component from configuration around `renderer`
    pub fn from_config(
        config: &Config,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self, prometheus::Error> {
        let cache = Arc::new(CacheStore::from_config(&config.cache));
        let metrics =
            Arc::new(MetricsAggregator::from_config(&config.metrics)?.with_cache(Arc::clone(&cache)));
        let rate_limiter = Arc::new(RateLimitManager::from_config(&config.rate_limit));
        let gate = Arc::new(ConversionGate::new(
            renderer,
            Arc::clone(&cache),
            Arc::clone(&metrics),
            &config.conversion,
        ));

        Ok(Self::new(rate_limiter, gate, cache, metrics))
    }

    /// Admit and convert one request from `client_id`
    ///
    /// A rejected request is recorded as `rate_limited` and never reaches the
    /// gate.
    pub async fn submit(
        &self,
        client_id: &str,
        request: ConversionRequest,
    ) -> Result<Converted, ConvertError> {
        let started = Instant::now();

        if let Err(limit) = self.rate_limiter.check(client_id) {
            let err = ConvertError::RateLimited {
                client_id: client_id.to_string(),
                retry_after: limit.retry_after(),
            };
            tracing::warn!(
                client_id,
                retry_after_secs = limit.retry_after().as_secs(),
                reason = %limit,
                "Rate limit exceeded"
            );
            self.metrics.record(
                ConversionOutcome::failure(&err, started.elapsed(), request.html.len())
                    .with_client(client_id),
            );
            return Err(err);
        }

        self.gate.convert_for(Some(client_id), request).await
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimitManager> {
        &self.rate_limiter
    }

    pub fn gate(&self) -> &Arc<ConversionGate> {
        &self.gate
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<MetricsAggregator> {
        &self.metrics
    }
}
