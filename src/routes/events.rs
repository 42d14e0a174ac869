/**
 * Event Routes
 * Donation drives and awareness events
 */
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::db::models::{Event, EventInput};
use crate::error::ApiError;
use crate::routes::{ApiJson, AppState};
use crate::validation;

/// GET /api/events
pub async fn list_events(State(state): State<AppState>) -> Result<Json<Vec<Event>>, ApiError> {
    Ok(Json(state.store.list_events().await?))
}

/// POST /api/events
pub async fn create_event(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<EventInput>,
) -> Result<impl IntoResponse, ApiError> {
    let event = validation::new_event(payload)?;
    let created = state.store.insert_event(event).await?;

    tracing::info!(event_id = %created.id, kind = %created.kind, date = %created.date, "event created");

    Ok((StatusCode::CREATED, Json(created)))
}
