//! Conversion gate
//!
//! Every conversion goes through [`ConversionGate::convert`]:
//!
//! 1. Reject inputs at or above `max_html_bytes` before any other work
//! 2. If the request allows it, serve from the cache by content fingerprint
//! 3. Otherwise render on a semaphore-bounded task; queue wait plus render is
//!    bounded by `render_timeout`, and the task is aborted when it elapses
//! 4. Store the result, hint the renderer to reclaim memory, return
//!
//! Whatever path a request takes, exactly one outcome is recorded.

pub mod renderer;

use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::cache::{CacheStore, Fingerprint};
use crate::config::ConversionConfig;
use crate::error::ConvertError;
use crate::metrics::{ConversionOutcome, MetricsAggregator, OutcomeStatus};

pub use renderer::{BlockingRenderer, CommandRenderer, RenderError, Renderer};

fn default_use_cache() -> bool {
    true
}

/// Body of a conversion request
#[derive(Debug, Clone, Deserialize)]
pub struct ConversionRequest {
    pub html: String,
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

impl ConversionRequest {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            use_cache: true,
        }
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }
}

/// A successful conversion
#[derive(Debug, Clone)]
pub struct Converted {
    pub pdf: Bytes,
    pub cache_hit: bool,
    /// Present when the cache was consulted
    pub fingerprint: Option<Fingerprint>,
    pub duration: Duration,
}

pub struct ConversionGate {
    renderer: Arc<dyn Renderer>,
    cache: Arc<CacheStore>,
    metrics: Arc<MetricsAggregator>,
    permits: Arc<Semaphore>,
    max_html_bytes: usize,
    render_timeout: Duration,
}

impl ConversionGate {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        cache: Arc<CacheStore>,
        metrics: Arc<MetricsAggregator>,
        config: &ConversionConfig,
    ) -> Self {
        Self {
            renderer,
            cache,
            metrics,
            permits: Arc::new(Semaphore::new(config.max_concurrent_renders.max(1))),
            max_html_bytes: config.max_html_bytes,
            render_timeout: config.render_timeout(),
        }
    }

    /// Convert a document for an anonymous caller
    pub async fn convert(&self, request: ConversionRequest) -> Result<Converted, ConvertError> {
        self.convert_for(None, request).await
    }

    /// Convert a document, attributing the outcome to `client_id`
    pub async fn convert_for(
        &self,
        client_id: Option<&str>,
        request: ConversionRequest,
    ) -> Result<Converted, ConvertError> {
        let started = Instant::now();
        let input_size = request.html.len();

        if input_size >= self.max_html_bytes {
            let err = ConvertError::Validation {
                size: input_size,
                limit: self.max_html_bytes,
            };
            tracing::info!(input_size, limit = self.max_html_bytes, "Rejected oversized HTML input");
            self.record(
                ConversionOutcome::failure(&err, started.elapsed(), input_size),
                client_id,
            );
            return Err(err);
        }

        let fingerprint =
            (request.use_cache && self.cache.is_enabled()).then(|| Fingerprint::of(&request.html));
        let cache_eligible = fingerprint.is_some();

        if let Some(fp) = &fingerprint {
            if let Some(pdf) = self.cache.lookup(fp) {
                let duration = started.elapsed();
                tracing::debug!(fingerprint = %fp.short(), output_size = pdf.len(), "Served PDF from cache");
                self.record(
                    ConversionOutcome::new(OutcomeStatus::Success, duration, input_size)
                        .with_output(pdf.len())
                        .with_cache(true, true),
                    client_id,
                );
                return Ok(Converted {
                    pdf,
                    cache_hit: true,
                    fingerprint,
                    duration,
                });
            }
        }

        match self.render(request.html).await {
            Ok(pdf) => {
                if let Some(fp) = &fingerprint {
                    self.cache.insert(fp.clone(), pdf.clone(), self.cache.ttl());
                }
                self.renderer.reclaim();

                let duration = started.elapsed();
                tracing::info!(
                    fingerprint = fingerprint.as_ref().map(|fp| fp.short()).unwrap_or("-"),
                    input_size,
                    output_size = pdf.len(),
                    duration_ms = duration.as_millis() as u64,
                    "Rendered PDF"
                );
                self.record(
                    ConversionOutcome::new(OutcomeStatus::Success, duration, input_size)
                        .with_output(pdf.len())
                        .with_cache(cache_eligible, false),
                    client_id,
                );
                Ok(Converted {
                    pdf,
                    cache_hit: false,
                    fingerprint,
                    duration,
                })
            }
            Err(err) => {
                self.record(
                    ConversionOutcome::failure(&err, started.elapsed(), input_size)
                        .with_cache(cache_eligible, false),
                    client_id,
                );
                Err(err)
            }
        }
    }

    /// Render on the bounded pool under the timeout
    async fn render(&self, html: String) -> Result<Bytes, ConvertError> {
        let permits = Arc::clone(&self.permits);
        let renderer = Arc::clone(&self.renderer);

        let mut task = tokio::spawn(async move {
            let permit = permits
                .acquire_owned()
                .await
                .map_err(|_| RenderError::Engine("render pool is closed".to_string()))?;
            // The renderer keeps the permit until its work has really stopped
            renderer.render_with_permit(html, permit).await
        });

        match tokio::time::timeout(self.render_timeout, &mut task).await {
            Ok(Ok(Ok(pdf))) => Ok(pdf),
            Ok(Ok(Err(e))) => {
                tracing::warn!(error = %e, "Renderer failed");
                Err(ConvertError::Render(e.to_string()))
            }
            Ok(Err(join_err)) => {
                tracing::error!(error = %join_err, "Render task panicked");
                Err(ConvertError::Render(format!("render task failed: {}", join_err)))
            }
            Err(_) => {
                task.abort();
                tracing::warn!(
                    timeout_secs = self.render_timeout.as_secs_f64(),
                    "Render timed out, task aborted"
                );
                Err(ConvertError::Timeout {
                    timeout: self.render_timeout,
                })
            }
        }
    }

    fn record(&self, outcome: ConversionOutcome, client_id: Option<&str>) {
        let outcome = match client_id {
            Some(id) => outcome.with_client(id),
            None => outcome,
        };
        self.metrics.record(outcome);
    }

    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    /// Render slots not currently in use
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn max_html_bytes(&self) -> usize {
        self.max_html_bytes
    }

    pub fn render_timeout(&self) -> Duration {
        self.render_timeout
    }
}
