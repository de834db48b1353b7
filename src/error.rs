// Error types module

use std::time::Duration;

/// Failure of a single conversion request
///
/// Each variant maps to a distinct HTTP status and a stable machine-readable
/// code, so automated clients can tell an oversized document from a
/// rate-limited one without parsing the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    /// HTML input is at or above the configured size limit
    #[error("HTML input of {size} bytes exceeds the {limit} byte limit")]
    Validation { size: usize, limit: usize },

    /// Client exceeded its request budget for the current window
    #[error("Rate limit exceeded for client {client_id}")]
    RateLimited {
        client_id: String,
        retry_after: Duration,
    },

    /// Render did not finish within the configured bound
    #[error("Rendering did not complete within {}s", .timeout.as_secs_f64())]
    Timeout { timeout: Duration },

    /// The external renderer failed
    #[error("Error converting HTML to PDF: {0}")]
    Render(String),
}

impl ConvertError {
    /// Stable identifier, shared with `OutcomeStatus` serialization
    pub fn code(&self) -> &'static str {
        match self {
            ConvertError::Validation { .. } => "validation_error",
            ConvertError::RateLimited { .. } => "rate_limited",
            ConvertError::Timeout { .. } => "timeout",
            ConvertError::Render(_) => "render_error",
        }
    }

    /// HTTP status code the transport layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            ConvertError::Validation { .. } => 413,
            ConvertError::RateLimited { .. } => 429,
            ConvertError::Timeout { .. } => 504,
            ConvertError::Render(_) => 500,
        }
    }

    /// Whether the failure was caused by the client (never retried by us)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ConvertError::Validation { .. } | ConvertError::RateLimited { .. }
        )
    }
}
