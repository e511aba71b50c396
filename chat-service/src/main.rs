//! Real-time chat gateway.
//!
//! One process serves the WebSocket endpoint, the chat REST routes, and the
//! operational probes:
//! - GET  /ws                                — authenticated socket upgrade
//! - POST /api/chat/rooms                    — create or find a room
//! - GET  /api/chat/rooms                    — caller's rooms with last message
//! - GET  /api/chat/rooms/{room_id}/messages — paginated history
//! - GET  /health, /ready, /metrics          — probes and Prometheus scrape

mod auth;
mod bridge;
mod config;
mod connection;
mod error;
mod fanout;
mod metrics;
mod rate_limiter;
mod registry;
mod routes;
mod state;
mod ws_handler;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use jwt_common::TokenService;
use storage::postgres::PgChatStore;

use crate::config::Config;
use crate::rate_limiter::RateLimiter;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_service=info,tower_http=debug".into()),
        )
        .init();

    metrics::init_metrics()?;

    let config = Config::from_env();

    let store = PgChatStore::connect(&config.database_url).await?;
    store.run_migrations().await?;
    info!("Database connected, migrations applied");

    let state = Arc::new(AppState::new(
        Arc::new(store),
        TokenService::from_env(),
        RateLimiter::from_env(),
        config.allowed_origins.clone(),
    ));

    let app = Router::new()
        .route("/ws", get(ws_handler::ws_handler))
        .route(
            "/api/chat/rooms",
            post(routes::create_room).get(routes::list_rooms),
        )
        .route(
            "/api/chat/rooms/{room_id}/messages",
            get(routes::room_messages),
        )
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(config.bind_addr.as_str()).await?;
    info!(bind_addr = %config.bind_addr, "Chat service starting");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(state))
    .await?;

    Ok(())
}

async fn shutdown_signal(state: Arc<AppState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
    state.shutdown();
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn ready_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "uptime_secs": state.uptime_secs(),
        "connections": state.registry.len(),
        "room_channels": state.channels.len(),
    }))
}
