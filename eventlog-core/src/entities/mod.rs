pub mod event_records;

/// Failures surfaced by the event store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Event data could not be encoded, or a stored row does not decode
    /// back into a JSON object.
    #[error("event data encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}
