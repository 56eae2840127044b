//! System endpoints: health check and live connection stats.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::dto::StatsResponse;
use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /stats` — Live connection statistics.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "System",
    summary = "Connection stats",
    description = "Returns the number of registered live connections with a summary of each.",
    responses(
        (status = 200, description = "Registry snapshot", body = StatsResponse),
    )
)]
pub async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    let live = state.registry.summaries().await;
    Json(StatsResponse {
        connections: live.len(),
        live,
    })
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
}
