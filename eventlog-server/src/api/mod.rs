//! HTTP and WebSocket handlers.
//!
//! # Endpoints
//!
//! - `GET /`       – static welcome payload
//! - `GET /events` – list stored events, optionally filtered by `event_type`
//! - `GET /ws`     – WebSocket event ingest stream

use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::get};
use eventlog_core::entities::StoreError;
use eventlog_sdk::objects::WelcomeResponse;

use crate::state::AppState;

mod events;
mod ws;

pub const WELCOME_MESSAGE: &str = "Welcome to the Event WebSocket API!";

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/events", get(events::list_events))
        .route("/ws", get(ws::event_ws))
}

/// `GET /` — liveness/info payload.
async fn home() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: WELCOME_MESSAGE.to_owned(),
    })
}

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

/// Errors that can occur in HTTP handlers.
#[derive(Debug)]
pub(crate) enum ApiError {
    Store(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::Store(e) => {
                tracing::error!(error = %e, "API store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}
