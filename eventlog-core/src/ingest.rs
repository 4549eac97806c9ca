//! Per-frame ingest pipeline: parse → validate → append → acknowledge.

use crate::entities::StoreError;
use crate::entities::event_records::{AppendEvent, EventRecord};
use crate::framework::DatabaseProcessor;
use crate::schema::{EventSchema, ValidationError};
use eventlog_sdk::objects::{Acknowledgment, InboundEvent};
use kanau::processor::Processor;
use serde_json::Value;
use std::sync::Arc;

/// Wire text sent in place of store failure details.
pub const STORE_FAILURE_MESSAGE: &str = "failed to store event";

/// The inbound frame is not a usable event.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid event format: expected a JSON object")]
    NotAnObject,

    #[error("invalid event format: missing 'type', 'data', or 'timestamp'")]
    MissingFields,
}

/// Everything that can reject a single inbound frame.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Text sent back to the client.
    ///
    /// Parse and validation messages only contain fixed wording plus names
    /// the client supplied, so they pass through. Store errors are reduced
    /// to a fixed message.
    pub fn client_message(&self) -> String {
        match self {
            IngestError::Parse(e) => e.to_string(),
            IngestError::Validation(e) => e.to_string(),
            IngestError::Store(_) => STORE_FAILURE_MESSAGE.to_owned(),
        }
    }
}

/// Decode one frame into an [`InboundEvent`].
///
/// `type` must be a non-empty string, `data` a non-empty object and
/// `timestamp` a number; anything else counts as missing.
pub fn parse_event(payload: &[u8]) -> Result<InboundEvent, ParseError> {
    let Value::Object(mut object) = serde_json::from_slice::<Value>(payload)? else {
        return Err(ParseError::NotAnObject);
    };

    let event_type = match object.remove("type") {
        Some(Value::String(t)) if !t.is_empty() => t,
        _ => return Err(ParseError::MissingFields),
    };
    let data = match object.remove("data") {
        Some(Value::Object(d)) if !d.is_empty() => d,
        _ => return Err(ParseError::MissingFields),
    };
    let timestamp = object
        .get("timestamp")
        .and_then(Value::as_f64)
        .ok_or(ParseError::MissingFields)?;

    Ok(InboundEvent {
        event_type,
        data,
        timestamp,
    })
}

/// Validates and stores inbound frames for one or more connections.
pub struct EventPipeline {
    schema: Arc<EventSchema>,
    store: DatabaseProcessor,
}

impl EventPipeline {
    pub fn new(schema: Arc<EventSchema>, store: DatabaseProcessor) -> Self {
        Self { schema, store }
    }

    pub fn schema(&self) -> &EventSchema {
        &self.schema
    }

    /// Run one frame through the pipeline.
    ///
    /// The record is only returned once the store has committed it.
    pub async fn ingest(&self, payload: &[u8]) -> Result<EventRecord, IngestError> {
        let event = parse_event(payload)?;
        self.schema.validate(&event.event_type, &event.data)?;

        let record = self
            .store
            .process(AppendEvent {
                event_type: event.event_type,
                event_data: event.data,
                event_timestamp: event.timestamp,
            })
            .await?;
        Ok(record)
    }

    /// Run one frame through the pipeline and build its acknowledgment.
    ///
    /// Never fails: every error becomes an [`Acknowledgment::Error`].
    pub async fn acknowledge(&self, payload: &[u8]) -> Acknowledgment {
        match self.ingest(payload).await {
            Ok(record) => {
                tracing::debug!(
                    event_id = record.id,
                    event_type = %record.event_type,
                    "Event stored"
                );
                Acknowledgment::Success {
                    event_id: record.id,
                }
            }
            Err(IngestError::Store(e)) => {
                tracing::error!(error = %e, "Failed to store event");
                Acknowledgment::error(STORE_FAILURE_MESSAGE)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Rejected inbound event");
                Acknowledgment::error(e.client_message())
            }
        }
    }
}
