//! Application state shared across all request handlers.

use crate::config::runtime::ServerConfig;
use eventlog_core::connections::ConnectionRegistry;
use eventlog_core::framework::DatabaseProcessor;
use eventlog_core::ingest::EventPipeline;
use eventlog_core::schema::EventSchema;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: SqlitePool,
    /// Event types and their required fields, fixed at startup.
    pub schema: Arc<EventSchema>,
    /// Currently open WebSocket connections.
    pub connections: ConnectionRegistry,
    /// Connection-level settings.
    pub server: Arc<ServerConfig>,
}

impl AppState {
    /// Create a new AppState with the given database pool and configuration.
    pub fn new(db: SqlitePool, schema: EventSchema, server: ServerConfig) -> Self {
        Self {
            db,
            schema: Arc::new(schema),
            connections: ConnectionRegistry::new(),
            server: Arc::new(server),
        }
    }

    /// A store handle backed by the shared pool.
    pub fn processor(&self) -> DatabaseProcessor {
        DatabaseProcessor {
            pool: self.db.clone(),
        }
    }

    /// An ingest pipeline for one connection.
    pub fn pipeline(&self) -> EventPipeline {
        EventPipeline::new(self.schema.clone(), self.processor())
    }
}
