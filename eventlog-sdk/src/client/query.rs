//! HTTP client for the read side (`GET /`, `GET /events`).

use reqwest::Client;
use url::Url;

use super::ClientError;
use crate::objects::{EventResponse, ListEventsQuery, WelcomeResponse};

/// Typed HTTP client for the event query endpoints.
#[derive(Debug, Clone)]
pub struct EventQueryClient {
    http: Client,
    base_url: Url,
}

impl EventQueryClient {
    /// Create a new client rooted at `base_url` (e.g. `http://127.0.0.1:8000`).
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `GET /` – the static welcome payload.
    pub async fn welcome(&self) -> Result<WelcomeResponse, ClientError> {
        let url = self.base_url.join("/")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /events` – list stored events, optionally filtered by type.
    pub async fn list_events(
        &self,
        event_type: Option<&str>,
    ) -> Result<Vec<EventResponse>, ClientError> {
        let url = self.base_url.join("/events")?;
        let query = ListEventsQuery {
            event_type: event_type.map(str::to_owned),
        };

        let resp = self.http.get(url).query(&query).send().await?;
        parse_response(resp).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
