//! murmur-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and live WebSocket endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use murmur_gateway::app_state::AppState;
use murmur_gateway::config::GatewayConfig;
use murmur_gateway::identity::{IdentityService, InMemoryIdentity, PostgresIdentity};
use murmur_gateway::persistence::{InMemoryMessageStore, MessageStore, PostgresMessageStore};
use murmur_gateway::server::{build_app, shutdown_signal};
use murmur_gateway::service::LivenessMonitor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env().context("invalid configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(addr = %config.listen_addr, "starting murmur-gateway");

    // Build collaborators
    let (identity, store): (Arc<dyn IdentityService>, Arc<dyn MessageStore>) =
        if config.persistence_enabled {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .min_connections(config.database_min_connections)
                .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
                .connect(&config.database_url)
                .await
                .context("failed to connect to database")?;
            sqlx::migrate!()
                .run(&pool)
                .await
                .context("failed to run migrations")?;
            tracing::info!("connected to database, migrations applied");
            (
                Arc::new(PostgresIdentity::new(pool.clone(), config.session_ttl())),
                Arc::new(PostgresMessageStore::new(pool)),
            )
        } else {
            tracing::warn!("persistence disabled, users and messages are kept in memory");
            (
                Arc::new(InMemoryIdentity::new(config.session_ttl())),
                Arc::new(InMemoryMessageStore::new()),
            )
        };

    // Build application state
    let listen_addr = config.listen_addr;
    let sweep_interval = config.sweep_interval();
    let app_state = AppState::new(config, identity, store);
    let registry = Arc::clone(&app_state.registry);

    // Start liveness monitor
    let monitor = LivenessMonitor::new(Arc::clone(&registry), sweep_interval).spawn();

    // Build router
    let app = build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;
    tracing::info!(addr = %listen_addr, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        monitor.abort();
        let closed = registry.close_all().await;
        tracing::info!(closed, "live connections closed");
    })
    .await
    .context("server error")?;

    tracing::info!("shutdown complete");
    Ok(())
}
