//! Rate Limiting with a Sliding Window Log
//!
//! Prevents a single client from monopolising the renderer by limiting how many
//! conversions it may start within a trailing time window.
//!
//! Two levels are checked, in this order:
//! 1. Per-client sliding window (keyed by client identifier, usually the peer IP)
//! 2. Global ceiling in requests per second (optional, `governor` GCRA)
//!
//! A client over its own limit is turned away before touching the global
//! quota, so it cannot starve other clients. A request the global ceiling
//! rejects is not recorded in the client's window.
//!
//! ## Sliding window semantics
//!
//! Each client keeps the instants of its admitted requests. A request is
//! admitted when, after dropping instants older than `now - window`, fewer than
//! `limit` remain. The boundary moves continuously with `now`, so there is no
//! burst at wall-clock window edges. Rejected requests are not recorded.
//!
//! ## Configuration Example
//!
//! ```yaml
//! rate_limit:
//!   enabled: true
//!   requests_per_window: 60
//!   window_seconds: 60
//!   global_requests_per_second: 200
//! ```

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// Admitted-request instants of one client, oldest first
#[derive(Debug, Default)]
struct RateWindow {
    timestamps: VecDeque<Instant>,
}

impl RateWindow {
    /// Drop instants that fell out of the trailing window
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Time until the oldest admitted request leaves the window
    fn retry_after(&self, now: Instant, window: Duration) -> Duration {
        self.timestamps
            .front()
            .map(|&oldest| match oldest.checked_add(window) {
                Some(free_at) => free_at.saturating_duration_since(now),
                None => window,
            })
            .unwrap_or(Duration::ZERO)
    }
}

/// Rate limiter manager handling the global ceiling and per-client windows
pub struct RateLimitManager {
    /// Global rate limiter (all requests)
    global: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    /// Per-client sliding windows (keyed by client identifier)
    clients: Mutex<HashMap<String, RateWindow>>,
    /// Admitted requests per client per window
    limit: usize,
    /// Sliding window length
    window: Duration,
    enabled: bool,
}

impl RateLimitManager {
    /// Create a limiter admitting `limit` requests per client per `window`
    ///
    /// # Arguments
    /// * `limit` - Requests admitted per client within any trailing window
    /// * `window` - Window length
    /// * `global_rps` - Global requests per second ceiling (None or 0 = disabled)
    pub fn new(limit: u32, window: Duration, global_rps: Option<u32>) -> Self {
        let global = global_rps
            .and_then(NonZeroU32::new)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        Self {
            global,
            clients: Mutex::new(HashMap::new()),
            limit: limit as usize,
            window,
            enabled: true,
        }
    }

    /// Create a limiter that admits everything
    pub fn disabled() -> Self {
        let mut manager = Self::new(0, Duration::ZERO, None);
        manager.enabled = false;
        manager
    }

    /// Create a limiter from configuration
    pub fn from_config(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self::new(
            config.requests_per_window,
            config.window(),
            config.global_requests_per_second,
        )
    }

    /// Admit a request from `client_id`, returning false if over budget
    pub fn admit(&self, client_id: &str) -> bool {
        self.check(client_id).is_ok()
    }

    /// Admit a request, reporting which limit rejected it
    pub fn check(&self, client_id: &str) -> Result<(), RateLimitError> {
        self.check_at(client_id, Instant::now())
    }

    pub(crate) fn check_at(&self, client_id: &str, now: Instant) -> Result<(), RateLimitError> {
        if !self.enabled {
            return Ok(());
        }

        let mut clients = self.clients.lock();
        let window = clients.entry(client_id.to_string()).or_default();
        window.prune(now, self.window);

        if window.timestamps.len() >= self.limit {
            return Err(RateLimitError::PerClient {
                client_id: client_id.to_string(),
                retry_after: window.retry_after(now, self.window),
            });
        }

        // Only requests the client's own window admits spend a global token
        if let Some(ref limiter) = self.global {
            if limiter.check().is_err() {
                return Err(RateLimitError::Global);
            }
        }

        window.timestamps.push_back(now);
        Ok(())
    }

    /// Remove clients with no admitted requests left in the window
    ///
    /// Bounds the tracking map when many distinct clients come and go.
    /// Returns the number of clients removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub(crate) fn sweep_at(&self, now: Instant) -> usize {
        let mut clients = self.clients.lock();
        let before_count = clients.len();
        let window = self.window;

        clients.retain(|_, entry| {
            entry.prune(now, window);
            !entry.timestamps.is_empty()
        });

        let evicted = before_count - clients.len();
        if evicted > 0 {
            tracing::debug!(
                evicted_clients = evicted,
                remaining_clients = clients.len(),
                "Swept idle rate limit windows"
            );
        }
        evicted
    }

    /// Number of clients currently tracked (for metrics/monitoring)
    pub fn tracked_client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Requests admitted per client per window
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Sliding window length
    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Error type indicating which rate limit was exceeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// Global ceiling exceeded
    Global,
    /// Client's sliding window is full
    PerClient {
        client_id: String,
        retry_after: Duration,
    },
}

impl RateLimitError {
    /// Suggested wait before retrying
    pub fn retry_after(&self) -> Duration {
        match self {
            RateLimitError::Global => Duration::from_secs(1),
            RateLimitError::PerClient { retry_after, .. } => *retry_after,
        }
    }
}

impl std::fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateLimitError::Global => write!(f, "Global rate limit exceeded"),
            RateLimitError::PerClient { client_id, .. } => {
                write!(f, "Rate limit exceeded for client: {}", client_id)
            }
        }
    }
}

impl std::error::Error for RateLimitError {}
