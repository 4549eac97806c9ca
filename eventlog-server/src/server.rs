//! Axum server setup and router configuration.

use crate::api;
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use eventlog_core::connections::ConnectionRegistry;
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .merge(api::router())
        // Add state to all routes
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    connections: usize,
}

/// Simple health check - returns OK if the server is running.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        connections: state.connections.len().await,
    })
}

/// Run the server with graceful shutdown support.
pub async fn run_server(
    router: Router,
    addr: SocketAddr,
    connections: ConnectionRegistry,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(connections))
        .await
}
