//! Service error types with HTTP status code mapping.
//!
//! [`RendezvousError`] is the central error type. Each variant maps to a
//! numeric code, an HTTP status, and a structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::store::StoreError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid request: user_id must not be empty",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Service error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category    | HTTP Status                |
/// |-----------|-------------|----------------------------|
/// | 1000–1999 | Validation  | 400 Bad Request            |
/// | 3000–3999 | Server      | 500 Internal Server Error  |
/// | 5000–5999 | Store       | 503 Service Unavailable    |
#[derive(Debug, thiserror::Error)]
pub enum RendezvousError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An inbox held a value that does not decode as an event.
    #[error("malformed stored event: {0}")]
    MalformedEvent(String),

    /// An event could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Store backend failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl RendezvousError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::MalformedEvent(_) => 3001,
            Self::Serialization(_) => 3002,
            Self::Store(_) => 5001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::MalformedEvent(_) | Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for RendezvousError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
