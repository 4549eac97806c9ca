use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use eventlog_core::entities::event_records::ListEvents;
use eventlog_sdk::objects::{EventResponse, ListEventsQuery};
use kanau::processor::Processor;

use super::ApiError;
use crate::state::AppState;

/// `GET /events` — list stored events, optionally filtered by type.
///
/// No pagination: every matching record is returned in insertion order.
pub(super) async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<ListEventsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let records = state
        .processor()
        .process(ListEvents {
            event_type: query.filter().map(str::to_owned),
        })
        .await
        .map_err(ApiError::Store)?;

    let response: Vec<EventResponse> = records.into_iter().map(Into::into).collect();
    Ok(Json(response))
}
