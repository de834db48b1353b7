//! Background sweeper
//!
//! Periodically drops idle rate-limit windows and expired cache entries, and
//! optionally asks the renderer to release memory. A sweep that panics is
//! logged and the next tick runs as usual.

use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::cache::CacheStore;
use crate::config::SweeperConfig;
use crate::constants::MAX_DURATION_SECS;
use crate::convert::Renderer;
use crate::rate_limit::RateLimitManager;

/// What one sweep removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub idle_clients: usize,
    pub expired_entries: usize,
}

pub struct BackgroundSweeper {
    rate_limiter: Arc<RateLimitManager>,
    cache: Arc<CacheStore>,
    renderer: Option<Arc<dyn Renderer>>,
    interval: Duration,
    shutdown: RwLock<Option<oneshot::Sender<()>>>,
}

impl BackgroundSweeper {
    pub fn new(
        rate_limiter: Arc<RateLimitManager>,
        cache: Arc<CacheStore>,
        interval: Duration,
    ) -> Self {
        Self {
            rate_limiter,
            cache,
            renderer: None,
            interval: interval.min(Duration::from_secs(MAX_DURATION_SECS)),
            shutdown: RwLock::new(None),
        }
    }

    pub fn from_config(
        config: &SweeperConfig,
        rate_limiter: Arc<RateLimitManager>,
        cache: Arc<CacheStore>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        let sweeper = Self::new(rate_limiter, cache, config.interval());
        if config.reclaim_memory {
            sweeper.with_reclaim(renderer)
        } else {
            sweeper
        }
    }

    /// Call `renderer.reclaim()` on every sweep
    pub fn with_reclaim(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Run one sweep now
    pub fn sweep_once(&self) -> SweepReport {
        let report = SweepReport {
            idle_clients: self.rate_limiter.sweep(),
            expired_entries: self.cache.purge_expired(),
        };
        if let Some(renderer) = &self.renderer {
            renderer.reclaim();
        }
        report
    }

    /// Start the periodic task; a second call while running is ignored
    ///
    /// The first sweep runs one full interval after start.
    pub fn start(self: &Arc<Self>) {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        {
            let mut guard = self.shutdown.write();
            if guard.is_some() {
                tracing::debug!("Sweeper already running, skipping duplicate start");
                return;
            }
            *guard = Some(shutdown_tx);
        }

        let sweeper = Arc::clone(self);
        let interval = self.interval;
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match catch_unwind(AssertUnwindSafe(|| sweeper.sweep_once())) {
                            Ok(report) => {
                                tracing::debug!(
                                    idle_clients = report.idle_clients,
                                    expired_entries = report.expired_entries,
                                    "Sweep completed"
                                );
                            }
                            Err(_) => {
                                tracing::error!("Sweep panicked, continuing with next interval");
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Sweeper shutting down");
                        break;
                    }
                }
            }
        });

        tracing::info!(interval_secs = interval.as_secs(), "Started background sweeper");
    }

    pub fn stop(&self) {
        if let Some(shutdown_tx) = self.shutdown.write().take() {
            let _ = shutdown_tx.send(());
        }
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.read().is_some()
    }
}
