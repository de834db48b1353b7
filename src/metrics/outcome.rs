// Conversion outcome records

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::time::Duration;

use crate::error::ConvertError;

/// How a conversion request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    ValidationError,
    Timeout,
    RenderError,
    RateLimited,
}

impl OutcomeStatus {
    pub const ALL: [OutcomeStatus; 5] = [
        OutcomeStatus::Success,
        OutcomeStatus::ValidationError,
        OutcomeStatus::Timeout,
        OutcomeStatus::RenderError,
        OutcomeStatus::RateLimited,
    ];

    /// Label value, identical to the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::ValidationError => "validation_error",
            OutcomeStatus::Timeout => "timeout",
            OutcomeStatus::RenderError => "render_error",
            OutcomeStatus::RateLimited => "rate_limited",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeStatus::Success)
    }
}

impl From<&ConvertError> for OutcomeStatus {
    fn from(err: &ConvertError) -> Self {
        match err {
            ConvertError::Validation { .. } => OutcomeStatus::ValidationError,
            ConvertError::RateLimited { .. } => OutcomeStatus::RateLimited,
            ConvertError::Timeout { .. } => OutcomeStatus::Timeout,
            ConvertError::Render(_) => OutcomeStatus::RenderError,
        }
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}

/// One finished request, immutable once recorded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionOutcome {
    pub status: OutcomeStatus,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    /// HTML bytes received
    pub input_size: usize,
    /// PDF bytes returned (0 on failure)
    pub output_size: usize,
    pub cache_hit: bool,
    /// The cache was consulted for this request
    pub cache_eligible: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl ConversionOutcome {
    pub fn new(status: OutcomeStatus, duration: Duration, input_size: usize) -> Self {
        Self {
            status,
            duration,
            input_size,
            output_size: 0,
            cache_hit: false,
            cache_eligible: false,
            timestamp: Utc::now(),
            client_id: None,
        }
    }

    /// Outcome of a failed request
    pub fn failure(err: &ConvertError, duration: Duration, input_size: usize) -> Self {
        Self::new(OutcomeStatus::from(err), duration, input_size)
    }

    pub fn with_output(mut self, output_size: usize) -> Self {
        self.output_size = output_size;
        self
    }

    /// Mark whether the cache was consulted, and whether it answered
    pub fn with_cache(mut self, eligible: bool, hit: bool) -> Self {
        self.cache_eligible = eligible;
        self.cache_hit = eligible && hit;
        self
    }

    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Counted as a cache miss in the hit rate
    pub fn is_cache_miss(&self) -> bool {
        self.cache_eligible && !self.cache_hit
    }
}
