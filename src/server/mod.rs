// Server module - axum HTTP/WebSocket surface over the pipeline

pub mod error;
pub mod routes;
pub mod ws;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::convert::Renderer;
use crate::metrics::MetricsStream;
use crate::pipeline::Pipeline;
use crate::sweeper::BackgroundSweeper;

pub use error::ApiError;

/// Headroom for the JSON envelope around the HTML
const JSON_BODY_OVERHEAD: usize = 64 * 1024;

/// Worst-case growth of one input byte inside a JSON string (`<` as `\u003c`)
const JSON_ESCAPE_FACTOR: usize = 6;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pipeline: Arc<Pipeline>,
    stream: Arc<MetricsStream>,
    started_at: Instant,
    trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(
        pipeline: Arc<Pipeline>,
        stream: Arc<MetricsStream>,
        trust_forwarded_for: bool,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                pipeline,
                stream,
                started_at: Instant::now(),
                trust_forwarded_for,
            }),
        }
    }

    /// Whether client identity may come from `X-Forwarded-For`
    pub fn trust_forwarded_for(&self) -> bool {
        self.inner.trust_forwarded_for
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.inner.pipeline
    }

    pub fn stream(&self) -> &Arc<MetricsStream> {
        &self.inner.stream
    }

    pub fn uptime(&self) -> Duration {
        self.inner.started_at.elapsed()
    }
}

/// Request body ceiling for a given HTML limit
///
/// Any document under `max_html_bytes` fits however it is escaped, so size
/// decisions are made (and recorded) by the gate, not the transport.
pub fn body_limit_for(max_html_bytes: usize) -> usize {
    max_html_bytes
        .saturating_mul(JSON_ESCAPE_FACTOR)
        .saturating_add(JSON_BODY_OVERHEAD)
}

/// Build the router with every route mounted
pub fn router(state: AppState, cors_allow_any: bool) -> Router {
    let body_limit = body_limit_for(state.pipeline().gate().max_html_bytes());

    let router = Router::new()
        .route("/", get(routes::health))
        .route("/health", get(routes::health))
        .route("/convert/html-to-pdf", post(routes::convert_html_to_pdf))
        .route("/metrics", get(routes::metrics))
        .route("/metrics/history", get(routes::metrics_history))
        .route("/metrics/prometheus", get(routes::metrics_prometheus))
        .route("/ws/metrics", get(routes::metrics_ws))
        .route("/cache/stats", get(routes::cache_stats))
        .route("/cache/clear", post(routes::cache_clear))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http());

    let router = if cors_allow_any {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}

/// The running service: pipeline, live metrics feed and sweeper
pub struct PdfServer {
    state: AppState,
    sweeper: Arc<BackgroundSweeper>,
    listen_addr: String,
    cors_allow_any: bool,
}

impl PdfServer {
    /// Wire every component and start the background tasks
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_config(
        config: &Config,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self, prometheus::Error> {
        let pipeline = Arc::new(Pipeline::from_config(config, Arc::clone(&renderer))?);

        let stream = Arc::new(MetricsStream::start(
            Arc::clone(pipeline.metrics()),
            config.metrics.stream_interval(),
        ));

        let sweeper = Arc::new(BackgroundSweeper::from_config(
            &config.sweeper,
            Arc::clone(pipeline.rate_limiter()),
            Arc::clone(pipeline.cache()),
            renderer,
        ));
        sweeper.start();

        Ok(Self {
            state: AppState::new(pipeline, stream, config.server.trust_forwarded_for),
            sweeper,
            listen_addr: config.server.listen_addr(),
            cors_allow_any: config.server.cors_allow_any,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(&self) -> Router {
        router(self.state.clone(), self.cors_allow_any)
    }

    /// Serve until Ctrl+C or SIGTERM, then stop the background tasks
    pub async fn run(self) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.listen_addr).await?;
        tracing::info!(address = %self.listen_addr, "pdfgate listening");

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        self.shutdown();
        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Stop the sweeper and the metrics stream
    pub fn shutdown(&self) {
        self.sweeper.stop();
        self.state.stream().stop();
    }
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
