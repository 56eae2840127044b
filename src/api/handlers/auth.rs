//! Account handlers: register, login, logout.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use super::session_token;
use crate::api::dto::{CredentialsRequest, LogoutRequest, LogoutResponse, SessionResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};
use crate::origin::resolve_origin;

/// `POST /register` — Create an account and open a session.
///
/// # Errors
///
/// Returns [`GatewayError`] on malformed credentials or a taken username.
#[utoipa::path(
    post,
    path = "/api/v1/register",
    tag = "Auth",
    summary = "Register a user",
    description = "Creates a user and issues a session bound to the caller's address.",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "User created", body = SessionResponse),
        (status = 400, description = "Malformed username or password", body = ErrorResponse),
        (status = 409, description = "Username already taken", body = ErrorResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let origin = resolve_origin(&headers, peer, state.config.trust_proxy);
    let session = state
        .identity
        .register(req.username.trim(), &req.password, origin)
        .await?;
    Ok((StatusCode::CREATED, Json(SessionResponse::from(&session))))
}

/// `POST /login` — Open a session.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidCredentials`] on a bad username or password.
#[utoipa::path(
    post,
    path = "/api/v1/login",
    tag = "Auth",
    summary = "Log in",
    description = "Verifies the password and issues a new session bound to the caller's address.",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionResponse),
        (status = 401, description = "Incorrect username or password", body = ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let origin = resolve_origin(&headers, peer, state.config.trust_proxy);
    let session = state
        .identity
        .login(req.username.trim(), &req.password, origin)
        .await?;
    Ok(Json(SessionResponse::from(&session)))
}

/// `POST /logout` — Expire a session and close its live connections.
///
/// # Errors
///
/// Returns [`GatewayError::SessionInvalid`] if the session is unknown,
/// already expired or bound to another address.
#[utoipa::path(
    post,
    path = "/api/v1/logout",
    tag = "Auth",
    summary = "Log out",
    description = "Expires the session given in the body or the `x-access-token` header and disconnects every live connection using it.",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Session expired", body = LogoutResponse),
        (status = 401, description = "Session invalid", body = ErrorResponse),
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Option<Json<LogoutRequest>>,
) -> Result<impl IntoResponse, GatewayError> {
    let origin = resolve_origin(&headers, peer, state.config.trust_proxy);
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let token = session_token(&headers, req.session_id.as_deref())?;
    let session = state.session_gate.authenticate(token, origin).await?;

    state.identity.logout(session.session_id).await?;

    let connections = state
        .registry
        .connections_for_session(session.session_id)
        .await;
    for entry in &connections {
        state.registry.remove(entry.connection_id).await;
        entry.transport.close();
    }
    tracing::info!(
        username = %session.username,
        closed = connections.len(),
        "session logged out"
    );

    Ok(Json(LogoutResponse {
        success: true,
        closed_connections: connections.len(),
    }))
}

/// Account routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
}
