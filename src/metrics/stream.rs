//! Live metrics feed
//!
//! A background task takes a snapshot every tick and broadcasts it to every
//! subscriber. Subscribers are independent: one that falls behind skips the
//! ticks it missed (`RecvError::Lagged`) without slowing the others, and a
//! tick with no subscribers is simply dropped.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};

use super::{MetricsAggregator, MetricsSnapshot};
use crate::constants::METRICS_CHANNEL_CAPACITY;

/// Periodic broadcaster of metrics snapshots
pub struct MetricsStream {
    sender: broadcast::Sender<Arc<MetricsSnapshot>>,
    shutdown: RwLock<Option<oneshot::Sender<()>>>,
    interval: Duration,
}

impl MetricsStream {
    /// Start pushing a snapshot of `aggregator` every `interval`
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(aggregator: Arc<MetricsAggregator>, interval: Duration) -> Self {
        let (sender, _) = broadcast::channel(METRICS_CHANNEL_CAPACITY);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let tx = sender.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // No receivers is not an error, the snapshot is just dropped
                        let _ = tx.send(Arc::new(aggregator.snapshot()));
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Metrics stream shutting down");
                        break;
                    }
                }
            }
        });

        tracing::info!(interval_secs = interval.as_secs(), "Started metrics stream");

        Self {
            sender,
            shutdown: RwLock::new(Some(shutdown_tx)),
            interval,
        }
    }

    /// A new receiver that sees every snapshot sent from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<MetricsSnapshot>> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop the background task; receivers then observe `RecvError::Closed`
    pub fn stop(&self) {
        if let Some(shutdown_tx) = self.shutdown.write().take() {
            let _ = shutdown_tx.send(());
        }
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.read().is_some()
    }
}

impl Drop for MetricsStream {
    fn drop(&mut self) {
        self.stop();
    }
}
