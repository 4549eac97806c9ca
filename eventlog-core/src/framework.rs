use sqlx::SqlitePool;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// Embedded schema migrations for the event store.
pub static MIGRATOR: Migrator = sqlx::migrate!("../migrations");

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct DatabaseProcessor {
    pub pool: SqlitePool,
}

/// Open a SQLite pool for `database_url`, creating the database file if needed.
///
/// Connections are never recycled by idle time or age, so an in-memory
/// database (`sqlite::memory:` with a single connection) keeps its contents
/// for the lifetime of the pool.
pub async fn open_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .busy_timeout(BUSY_TIMEOUT);

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
}

/// Create the event tables if they do not exist yet.
pub async fn migrate(pool: &SqlitePool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
pub(crate) async fn memory_processor() -> DatabaseProcessor {
    let pool = open_pool("sqlite::memory:", 1).await.unwrap();
    migrate(&pool).await.unwrap();
    DatabaseProcessor { pool }
}
