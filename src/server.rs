//! HTTP server assembly and shutdown signalling.

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Upper bound on a single REST request. WebSocket sessions are upgraded
/// before the timeout applies to them.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the full application router: REST API, `/live` WebSocket and the
/// HTTP middleware stack.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()`;
/// handlers read the peer address to bind and check sessions.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(api::build_router())
        .route("/live", get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    REQUEST_TIMEOUT,
                ))
                .map_response(|res: axum::response::Response<_>| {
                    res.map(axum::body::Body::new)
                })
                .layer(TraceLayer::new_for_http()),
        )
        .with_state(state)
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::warn!("received ctrl-c, shutting down"),
        () = terminate => tracing::warn!("received SIGTERM, shutting down"),
    }
}
