//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//! On the WebSocket path the same variants decide whether a frame is dropped
//! silently or answered with an `error` frame.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 429,
///     "message": "rate limit exceeded; retry after 4200 ms",
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

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                 |
/// |-----------|-----------------|-----------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request             |
/// | 2000–2999 | Identity        | 401 Unauthorized / 409      |
/// | 3000–3999 | Server          | 500 Internal Server Error   |
/// | 429       | Rate limiting   | 429 Too Many Requests       |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Username/password pair did not match a registered user.
    #[error("incorrect username or password")]
    InvalidCredentials,

    /// Registration attempted with a username that already exists.
    #[error("username already taken: {0}")]
    UsernameTaken(String),

    /// Session is unknown, expired, or bound to another origin address.
    #[error("authentication error")]
    SessionInvalid,

    /// Author exceeded the posting rate.
    #[error("message rate limit exceeded; retry after {retry_after_ms} ms")]
    RateLimited {
        /// Milliseconds until the author may post again.
        retry_after_ms: u64,
    },

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidCredentials => 2001,
            Self::SessionInvalid => 2002,
            Self::UsernameTaken(_) => 2003,
            Self::PersistenceError(_) => 3001,
            Self::RateLimited { .. } => 429,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::SessionInvalid => StatusCode::UNAUTHORIZED,
            Self::UsernameTaken(_) => StatusCode::CONFLICT,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_maps_to_429() {
        let err = GatewayError::RateLimited {
            retry_after_ms: 1500,
        };
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.error_code(), 429);
        assert!(err.to_string().contains("1500"));
    }

    #[test]
    fn identity_errors_are_client_errors() {
        assert_eq!(
            GatewayError::SessionInvalid.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::UsernameTaken("alice".to_string()).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn into_response_sets_status() {
        let response = GatewayError::InvalidRequest("no destination".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
