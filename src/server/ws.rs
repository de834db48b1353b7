//! WebSocket metrics feed
//!
//! Each connection gets one snapshot immediately, then one per stream tick.
//! Incoming messages are ignored apart from Close.

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::metrics::MetricsSnapshot;

use super::AppState;

/// Drive one WebSocket connection until either side goes away
pub async fn serve_metrics(socket: WebSocket, state: AppState) {
    let connection_id = uuid::Uuid::new_v4();
    let (sender, mut receiver) = socket.split();

    // Subscribe before taking the first snapshot so no tick is lost in between
    let updates = state.stream().subscribe();
    let first = Arc::new(state.pipeline().metrics().snapshot());

    tracing::debug!(%connection_id, "Metrics WebSocket connected");

    let mut forward = tokio::spawn(forward_snapshots(sender, first, updates));
    let mut inbound = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut forward => inbound.abort(),
        _ = &mut inbound => forward.abort(),
    }

    tracing::debug!(%connection_id, "Metrics WebSocket disconnected");
}

/// Send `first`, then every snapshot from `updates`, as JSON text frames
///
/// Returns when the sink rejects a frame or the stream shuts down. A lagging
/// connection skips the ticks it missed.
pub(crate) async fn forward_snapshots<S>(
    mut sink: S,
    first: Arc<MetricsSnapshot>,
    mut updates: broadcast::Receiver<Arc<MetricsSnapshot>>,
) where
    S: Sink<Message> + Unpin,
{
    if send_snapshot(&mut sink, &first).await.is_err() {
        return;
    }

    loop {
        match updates.recv().await {
            Ok(snapshot) => {
                if send_snapshot(&mut sink, &snapshot).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Metrics subscriber lagging, skipped snapshots");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn send_snapshot<S>(sink: &mut S, snapshot: &MetricsSnapshot) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
{
    let text = match serde_json::to_string(snapshot) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize metrics snapshot");
            return Ok(());
        }
    };
    sink.send(Message::Text(text)).await.map_err(|_| ())
}
