// HTTP handlers

use axum::extract::{ConnectInfo, Query, State, WebSocketUpgrade};
use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use super::error::ApiError;
use super::{ws, AppState};
use crate::cache::CacheStats;
use crate::convert::ConversionRequest;
use crate::metrics::{ConversionOutcome, MetricsSnapshot};

/// Outcomes returned by /metrics/history when no limit is given
const DEFAULT_HISTORY_LIMIT: usize = 100;

static X_CACHE: HeaderName = HeaderName::from_static("x-cache");
static X_RENDER_TIME_MS: HeaderName = HeaderName::from_static("x-render-time-ms");

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub message: &'static str,
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

/// GET / and GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "HTML to PDF API is running",
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime().as_secs(),
    })
}

/// Identify the caller for rate limiting
///
/// The peer address, unless forwarding is trusted and an `X-Forwarded-For`
/// header is present, in which case its first hop.
fn client_id(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    let forwarded = if trust_forwarded_for {
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    } else {
        None
    };

    forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// POST /convert/html-to-pdf
pub async fn convert_html_to_pdf(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(request): Json<ConversionRequest>,
) -> Result<Response, ApiError> {
    let client = client_id(
        &headers,
        peer.map(|ConnectInfo(addr)| addr),
        state.trust_forwarded_for(),
    );

    let converted = state.pipeline().submit(&client, request).await?;

    let cache_header = if converted.cache_hit { "HIT" } else { "MISS" };
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            "attachment; filename=output.pdf".to_string(),
        ),
        (X_CACHE.clone(), cache_header.to_string()),
        (
            X_RENDER_TIME_MS.clone(),
            converted.duration.as_millis().to_string(),
        ),
    ];
    Ok((StatusCode::OK, headers, converted.pdf).into_response())
}

/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.pipeline().metrics().snapshot())
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

/// GET /metrics/history?limit=N, oldest first
pub async fn metrics_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Json<Vec<ConversionOutcome>> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Json(state.pipeline().metrics().history(limit))
}

/// GET /metrics/prometheus
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.pipeline().metrics().export_prometheus(),
    )
}

/// GET /ws/metrics
pub async fn metrics_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| ws::serve_metrics(socket, state))
}

/// GET /cache/stats
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.pipeline().cache().stats())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub cleared: usize,
}

/// POST /cache/clear
pub async fn cache_clear(State(state): State<AppState>) -> Json<ClearResponse> {
    let cleared = state.pipeline().cache().clear();
    tracing::info!(cleared, "Cache cleared");
    Json(ClearResponse { cleared })
}
