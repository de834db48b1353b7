// HTTP mapping of conversion failures

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::ConvertError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Reason phrase of the status code
    pub error: String,
    pub code: &'static str,
    pub message: String,
}

/// A `ConvertError` on its way out of a handler
#[derive(Debug)]
pub struct ApiError(pub ConvertError);

impl From<ConvertError> for ApiError {
    fn from(err: ConvertError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = Json(ErrorBody {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code: self.0.code(),
            message: self.0.to_string(),
        });

        let mut response = (status, body).into_response();

        if let ConvertError::RateLimited { retry_after, .. } = &self.0 {
            // Whole seconds, never zero
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }
        response
    }
}
