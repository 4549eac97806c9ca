//! Types for the HTTP read side: `GET /` and `GET /events`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Query parameters for `GET /events`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListEventsQuery {
    /// Only return events of this type. An empty value means no filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

impl ListEventsQuery {
    /// The effective filter, treating an empty string as "no filter".
    pub fn filter(&self) -> Option<&str> {
        self.event_type.as_deref().filter(|t| !t.is_empty())
    }
}

/// A stored event as returned by `GET /events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventResponse {
    pub id: i64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Map<String, Value>,
    pub timestamp: f64,
}

/// Static payload served by `GET /`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub message: String,
}
