//! eventlog server
//!
//! Accepts typed events over a WebSocket, validates them against the event
//! schema, stores them durably and acknowledges each one.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::ConfigLoader;
use server::{build_router, run_server};
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// eventlog - WebSocket event ingest server
#[derive(Parser, Debug)]
#[command(name = "eventlog-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./eventlog.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://event_log.db")]
    database_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting eventlog-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = ConfigLoader::new(&args.config, args.listen);
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = loaded_config.server.listen;
    tracing::info!(
        event_types = loaded_config.schema.len(),
        "Configuration loaded from {:?}",
        args.config
    );

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = eventlog_core::framework::open_pool(
        &args.database_url,
        loaded_config.database.max_connections,
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to connect to database: {}", e);
        e
    })?;
    tracing::info!("Database connection established");

    // The event table is created if absent
    eventlog_core::framework::migrate(&db_pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to run migrations: {}", e);
            e
        })?;

    // Create application state
    let state = AppState::new(db_pool.clone(), loaded_config.schema, loaded_config.server);

    let connections = state.connections.clone();

    // Build the router
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr, connections).await;

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
