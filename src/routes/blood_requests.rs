/**
 * Blood Request Routes
 * Public board of organizations asking for blood
 */
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::db::models::{BloodRequest, BloodRequestInput};
use crate::error::ApiError;
use crate::routes::{ApiJson, AppState};
use crate::validation;

/// GET /api/blood-requests
pub async fn list_requests(
    State(state): State<AppState>,
) -> Result<Json<Vec<BloodRequest>>, ApiError> {
    Ok(Json(state.store.list_blood_requests().await?))
}

/// POST /api/blood-requests
pub async fn create_request(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<BloodRequestInput>,
) -> Result<impl IntoResponse, ApiError> {
    let request = validation::new_blood_request(payload)?;
    let created = state.store.insert_blood_request(request).await?;

    tracing::info!(
        request_id = %created.id,
        urgency = %created.urgency,
        blood_type = %created.blood_type,
        "blood request posted"
    );

    Ok((StatusCode::CREATED, Json(created)))
}
