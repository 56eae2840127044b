//! Axum WebSocket upgrade handler.

use std::net::SocketAddr;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::origin::resolve_origin;

/// `GET /live` — Upgrade HTTP connection to WebSocket.
///
/// The client origin is fixed at upgrade time; every later session check
/// on this socket uses it.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let origin = resolve_origin(&headers, peer, state.config.trust_proxy);
    tracing::debug!(%origin, "ws upgrade");
    ws.on_upgrade(move |socket| run_connection(socket, state, origin))
}
