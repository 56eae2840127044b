//! REST endpoint handlers organized by resource.

pub mod auth;
pub mod message;
pub mod system;

use axum::Router;
use axum::http::HeaderMap;

use crate::app_state::AppState;
use crate::error::GatewayError;

/// Header carrying the session id on authenticated requests.
pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth::routes())
        .merge(message::routes())
}

/// Picks the session id from the request body, falling back to the
/// `x-access-token` header.
///
/// # Errors
///
/// Returns [`GatewayError::SessionInvalid`] if neither is present.
pub fn session_token<'a>(
    headers: &'a HeaderMap,
    body: Option<&'a str>,
) -> Result<&'a str, GatewayError> {
    body.map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get(ACCESS_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .ok_or(GatewayError::SessionInvalid)
}
