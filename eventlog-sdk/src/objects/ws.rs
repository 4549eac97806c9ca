//! WebSocket message types for the event ingest stream.
//!
//! The `GET /ws` endpoint upgrades to a WebSocket connection. The client
//! sends [`InboundEvent`] JSON frames; the server answers every frame with
//! exactly one [`Acknowledgment`].
//!
//! # Protocol
//!
//! 1. The client sends `{"type":"event_1","data":{...},"timestamp":1638316800.0}`.
//! 2. The server validates the event against its schema, stores it and
//!    replies with `{"status":"success","event_id":1}`.
//! 3. Malformed, unknown or incomplete events are answered with
//!    `{"status":"error","error":"..."}`; the connection stays open.
//! 4. Only a close frame (or a dropped transport) ends the session.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Client-to-server event frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Event type identifier, selects the required-field schema.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Arbitrary key-value payload.
    pub data: Map<String, Value>,
    /// Caller-supplied timestamp (seconds since the epoch, fractional).
    pub timestamp: f64,
}

impl InboundEvent {
    pub fn new(event_type: impl Into<String>, data: Map<String, Value>, timestamp: f64) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            timestamp,
        }
    }
}

/// Server-to-client acknowledgment, one per processed inbound frame.
///
/// Serialized as an internally-tagged JSON object keyed on `"status"`:
///
/// ```json
/// {"status":"success","event_id":42}
/// {"status":"error","error":"invalid event type: event_9"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Acknowledgment {
    /// The event was validated and durably stored.
    Success {
        /// Identifier assigned by the event store.
        event_id: i64,
    },
    /// The event was rejected; nothing was stored.
    Error {
        /// Human-readable reason.
        error: String,
    },
}

impl Acknowledgment {
    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error {
            error: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The stored event id, if this is a success acknowledgment.
    pub fn event_id(&self) -> Option<i64> {
        match self {
            Self::Success { event_id } => Some(*event_id),
            Self::Error { .. } => None,
        }
    }
}
