//! Signal handling for graceful shutdown.

use eventlog_core::connections::ConnectionRegistry;
use tokio::signal::unix::{SignalKind, signal};

/// Completes when SIGTERM or SIGINT (Ctrl+C) is received.
///
/// This only stops the listener. Upgraded WebSocket tasks run detached
/// from axum and are not drained; they end when `main` closes the pool
/// and returns.
pub async fn shutdown_signal(connections: ConnectionRegistry) {
    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!(error = %e, "Failed to install signal handlers, graceful shutdown disabled");
            return std::future::pending().await;
        }
    };

    let signal_name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };

    let open_connections = connections.len().await;
    tracing::info!(
        open_connections,
        "Received {}, initiating graceful shutdown",
        signal_name
    );
}
