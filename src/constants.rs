// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers keeps the config defaults,
// the component constructors and the tests in agreement.

// =============================================================================
// Limits
// =============================================================================

/// Upper bound for every configured duration (10 years)
///
/// Keeps `Instant + Duration` arithmetic far from overflow.
pub const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

// =============================================================================
// Server defaults
// =============================================================================

/// Default bind address
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8000;

// =============================================================================
// Cache defaults
// =============================================================================

/// Default maximum number of cached PDFs
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 100;

/// Default cache TTL in seconds (1 hour)
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;

// =============================================================================
// Conversion defaults
// =============================================================================

/// Default maximum HTML input size (10 MB)
pub const DEFAULT_MAX_HTML_BYTES: usize = 10 * 1024 * 1024;

/// Default render timeout in seconds
pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 30;

/// Default number of renders allowed to run at once
pub const DEFAULT_MAX_CONCURRENT_RENDERS: usize = 4;

/// Default external renderer program
pub const DEFAULT_RENDERER_COMMAND: &str = "weasyprint";

// =============================================================================
// Rate limit defaults
// =============================================================================

/// Default admitted requests per client per window
pub const DEFAULT_REQUESTS_PER_WINDOW: u32 = 60;

/// Default sliding window length in seconds
pub const DEFAULT_RATE_WINDOW_SECS: u64 = 60;

// =============================================================================
// Metrics defaults
// =============================================================================

/// Default number of outcomes kept in the history ring
pub const DEFAULT_HISTORY_SIZE: usize = 1000;

/// Default push interval for the live metrics feed in seconds
pub const DEFAULT_STREAM_INTERVAL_SECS: u64 = 5;

/// Capacity of the broadcast channel feeding metrics subscribers
pub const METRICS_CHANNEL_CAPACITY: usize = 16;

// =============================================================================
// Sweeper defaults
// =============================================================================

/// Default sweep interval in seconds (5 minutes)
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
