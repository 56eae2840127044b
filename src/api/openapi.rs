//! OpenAPI document for the REST surface.
//!
//! Served by Swagger UI at `/swagger-ui` when the `swagger-ui` feature is
//! enabled; the raw document lives at `/api-docs/openapi.json`.

use utoipa::OpenApi;

use crate::api::dto::{
    CredentialsRequest, HistoryResponse, LogoutRequest, LogoutResponse, PostMessageRequest,
    PostMessageResponse, SessionResponse, StatsResponse,
};
use crate::api::handlers::system::HealthResponse;
use crate::domain::ConnectionSummary;
use crate::error::{ErrorBody, ErrorResponse};
use crate::persistence::StoredMessage;

/// Gateway API document.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "murmur-gateway",
        description = "Session-authenticated chat gateway. Real-time delivery happens over the `/live` WebSocket; these endpoints cover accounts, posting and history.",
    ),
    tags(
        (name = "Auth", description = "Registration and sessions"),
        (name = "Messages", description = "Posting and history"),
        (name = "System", description = "Health and diagnostics"),
    ),
    paths(
        crate::api::handlers::auth::register,
        crate::api::handlers::auth::login,
        crate::api::handlers::auth::logout,
        crate::api::handlers::message::post_message,
        crate::api::handlers::message::channel_history,
        crate::api::handlers::message::private_history,
        crate::api::handlers::system::health_handler,
        crate::api::handlers::system::stats_handler,
    ),
    components(schemas(
        CredentialsRequest,
        SessionResponse,
        LogoutRequest,
        LogoutResponse,
        PostMessageRequest,
        PostMessageResponse,
        HistoryResponse,
        StoredMessage,
        StatsResponse,
        ConnectionSummary,
        HealthResponse,
        ErrorResponse,
        ErrorBody,
    ))
)]
pub struct ApiDoc;

/// Mounts Swagger UI at `/swagger-ui`.
#[cfg(feature = "swagger-ui")]
pub fn swagger_ui_router<S>() -> axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}
