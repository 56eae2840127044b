//! Message handlers: post, channel history, private history.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use super::session_token;
use crate::api::dto::{HistoryQuery, HistoryResponse, PostMessageRequest, PostMessageResponse};
use crate::app_state::AppState;
use crate::domain::MessageTarget;
use crate::error::{ErrorResponse, GatewayError};
use crate::origin::resolve_origin;

/// `POST /messages` — Post to a channel or a user.
///
/// # Errors
///
/// Returns [`GatewayError`] on an invalid session, a missing destination,
/// invalid content or when the author is rate limited.
#[utoipa::path(
    post,
    path = "/api/v1/messages",
    tag = "Messages",
    summary = "Post a message",
    description = "Persists the message and pushes it to every live connection that should see it. Authors may post a limited number of messages per window.",
    request_body = PostMessageRequest,
    params(
        ("x-access-token" = Option<String>, Header, description = "Session id when not given in the body"),
    ),
    responses(
        (status = 201, description = "Message accepted", body = PostMessageResponse),
        (status = 400, description = "No destination or invalid content", body = ErrorResponse),
        (status = 401, description = "Session invalid", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse),
    )
)]
pub async fn post_message(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<PostMessageRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let origin = resolve_origin(&headers, peer, state.config.trust_proxy);
    let token = session_token(&headers, req.session_id.as_deref())?;
    let session = state.session_gate.authenticate(token, origin).await?;

    let target = MessageTarget::from_parts(req.channel.as_deref(), req.username.as_deref())
        .ok_or_else(|| {
            GatewayError::InvalidRequest("no message destination given".to_string())
        })?;

    let report = state
        .router
        .route_and_deliver(&session, target, req.content)
        .await?;

    Ok((StatusCode::CREATED, Json(PostMessageResponse::from(report))))
}

/// `GET /channels/{channel}/messages` — Channel history, newest first.
///
/// # Errors
///
/// Returns [`GatewayError::PersistenceError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/channels/{channel}/messages",
    tag = "Messages",
    summary = "Channel history",
    params(
        ("channel" = String, Path, description = "Channel name"),
        HistoryQuery,
    ),
    responses(
        (status = 200, description = "Page of messages, newest first", body = HistoryResponse),
    )
)]
pub async fn channel_history(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let page = query.page(state.config.history_max_limit);
    let messages = state.store.channel_history(&channel, page).await?;
    Ok(Json(HistoryResponse {
        messages,
        offset: page.offset,
        limit: page.limit,
    }))
}

/// `GET /private/{username}/messages` — Conversation between the caller
/// and `username`, newest first.
///
/// # Errors
///
/// Returns [`GatewayError::SessionInvalid`] without a valid
/// `x-access-token`.
#[utoipa::path(
    get,
    path = "/api/v1/private/{username}/messages",
    tag = "Messages",
    summary = "Private history",
    params(
        ("username" = String, Path, description = "The other participant"),
        ("x-access-token" = String, Header, description = "Caller's session id"),
        HistoryQuery,
    ),
    responses(
        (status = 200, description = "Page of messages, newest first", body = HistoryResponse),
        (status = 401, description = "Session invalid", body = ErrorResponse),
    )
)]
pub async fn private_history(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(username): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let origin = resolve_origin(&headers, peer, state.config.trust_proxy);
    let token = session_token(&headers, None)?;
    let session = state.session_gate.authenticate(token, origin).await?;

    let page = query.page(state.config.history_max_limit);
    let messages = state
        .store
        .private_history(&session.username, &username, page)
        .await?;
    Ok(Json(HistoryResponse {
        messages,
        offset: page.offset,
        limit: page.limit,
    }))
}

/// Message routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/messages", post(post_message))
        .route("/channels/{channel}/messages", get(channel_history))
        .route("/private/{username}/messages", get(private_history))
}
