/**
 * Donor Routes
 * Donor profile create/update/lookup and the public donor search
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::{DonorFilter, DonorListing, DonorProfile, DonorProfileInput, NewDonorProfile};
use crate::db::{StoreError, UniqueField};
use crate::error::ApiError;
use crate::routes::{ApiJson, AppState};
use crate::validation;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for GET /api/donors
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorSearchQuery {
    pub blood_type: Option<String>,
    pub available_only: Option<String>,
    pub search_term: Option<String>,
}

impl DonorSearchQuery {
    /// `"all"` and empty strings mean "no filter"; only the literal
    /// `"true"` enables the availability filter.
    pub fn into_filter(self) -> DonorFilter {
        let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        DonorFilter {
            blood_type: non_empty(self.blood_type).filter(|b| !b.eq_ignore_ascii_case("all")),
            available_only: self.available_only.as_deref() == Some("true"),
            search_term: non_empty(self.search_term),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ProfileResponse {
    pub message: String,
    pub profile: DonorProfile,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/donor-profile
pub async fn create_profile(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<DonorProfileInput>,
) -> Result<impl IntoResponse, ApiError> {
    let (user_id, fields) = validation::new_donor_profile(payload)?;

    let profile = state
        .store
        .insert_donor_profile(NewDonorProfile { user_id, fields })
        .await
        .map_err(|e| match e {
            StoreError::Conflict(UniqueField::DonorProfileUser) => ApiError::ProfileAlreadyExists,
            other => other.into(),
        })?;

    tracing::info!(profile_id = %profile.id, user_id = %user_id, "donor profile created");

    Ok((
        StatusCode::CREATED,
        Json(ProfileResponse {
            message: "Donor profile created successfully".to_string(),
            profile,
        }),
    ))
}

/// PUT /api/donor-profile/{id}
pub async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<DonorProfileInput>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::ProfileNotFound)?;
    let changes = validation::donor_profile_update(payload)?;

    let profile = state
        .store
        .update_donor_profile(id, changes)
        .await?
        .ok_or(ApiError::ProfileNotFound)?;

    tracing::info!(profile_id = %profile.id, available = profile.available, "donor profile updated");

    Ok(Json(ProfileResponse {
        message: "Donor profile updated successfully".to_string(),
        profile,
    }))
}

/// GET /api/donor-profile/{userId}
pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<DonorProfile>, ApiError> {
    let user_id = Uuid::parse_str(&user_id).map_err(|_| ApiError::ProfileNotFound)?;

    state
        .store
        .find_donor_profile_by_user(user_id)
        .await?
        .map(Json)
        .ok_or(ApiError::ProfileNotFound)
}

/// GET /api/donors
pub async fn list_donors(
    State(state): State<AppState>,
    Query(query): Query<DonorSearchQuery>,
) -> Result<Json<Vec<DonorListing>>, ApiError> {
    let filter = query.into_filter();
    let donors = state.store.search_donors(&filter).await?;
    tracing::debug!(count = donors.len(), ?filter, "donor search");
    Ok(Json(donors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AccountType, FieldValue, NewUser};
    use crate::error::ErrorResponse;
    use crate::test_support::{read_json, send_json, test_app};
    use axum::body::Body;
    use axum::http::{Method, Request};
    use axum::Router;
    use tower::ServiceExt;

    async fn add_user(state: &AppState, email: &str, location: &str) -> Uuid {
        state
            .store
            .insert_user(NewUser {
                name: format!("User {}", email),
                email: email.to_string(),
                password_hash: "x".to_string(),
                location: location.to_string(),
                account_type: AccountType::Donor,
                profile_image: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn create(app: &Router, input: &DonorProfileInput) -> axum::response::Response {
        send_json(app, Method::POST, "/api/donor-profile", input).await
    }

    async fn list(app: &Router, query: &str) -> Vec<DonorListing> {
        let req = Request::get(format!("/api/donors{}", query))
            .body(Body::empty())
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        read_json(res).await
    }

    fn input(user_id: Uuid, blood_type: &str, available: bool) -> DonorProfileInput {
        DonorProfileInput {
            user_id: Some(user_id.to_string()),
            blood_type: Some(blood_type.to_string()),
            available: Some(available),
            ..Default::default()
        }
    }

    #[test]
    fn test_query_into_filter() {
        let filter = DonorSearchQuery {
            blood_type: Some("all".into()),
            available_only: Some("1".into()),
            search_term: Some("  ".into()),
        }
        .into_filter();
        assert_eq!(filter, DonorFilter::default());

        let filter = DonorSearchQuery {
            blood_type: Some("O+".into()),
            available_only: Some("true".into()),
            search_term: Some("albany".into()),
        }
        .into_filter();
        assert_eq!(filter.blood_type.as_deref(), Some("O+"));
        assert!(filter.available_only);
        assert_eq!(filter.search_term.as_deref(), Some("albany"));
    }

    #[tokio::test]
    async fn test_create_then_fetch_by_user() {
        let (app, state, _dir) = test_app();
        let user_id = add_user(&state, "d@example.com", "Albany").await;

        let mut body = input(user_id, "O+", true);
        body.age = Some(FieldValue::from(29i64));
        body.donation_number = Some(FieldValue::from("3"));
        let res = create(&app, &body).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let created: ProfileResponse = read_json(res).await;
        assert_eq!(created.profile.user_id, user_id);
        assert_eq!(created.profile.age.as_deref(), Some("29"));
        assert_eq!(created.profile.donation_number, Some(3));

        let req = Request::get(format!("/api/donor-profile/{}", user_id))
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let fetched: DonorProfile = read_json(res).await;
        assert_eq!(fetched, created.profile);
    }

    #[tokio::test]
    async fn test_second_profile_for_same_user_is_rejected() {
        let (app, state, _dir) = test_app();
        let user_id = add_user(&state, "d@example.com", "Albany").await;

        let first = create(&app, &input(user_id, "O+", true)).await;
        assert_eq!(first.status(), StatusCode::CREATED);
        let second = create(&app, &input(user_id, "A-", false)).await;
        assert_eq!(second.status(), StatusCode::BAD_REQUEST);
        let err: ErrorResponse = read_json(second).await;
        assert_eq!(err.error, "ProfileAlreadyExists");

        let listed = list(&app, "").await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].profile.blood_type.as_deref(), Some("O+"));
    }

    #[tokio::test]
    async fn test_create_without_user_id_is_validation_error() {
        let (app, _state, _dir) = test_app();
        let res = create(&app, &DonorProfileInput::default()).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let err: ErrorResponse = read_json(res).await;
        assert_eq!(err.error, "ValidationError");
        assert!(err.errors.unwrap().contains_key("userId"));
    }

    #[tokio::test]
    async fn test_update_changes_only_sent_fields() {
        let (app, state, _dir) = test_app();
        let user_id = add_user(&state, "d@example.com", "Albany").await;
        let mut body = input(user_id, "O+", true);
        body.contact_phone = Some("555-0100".into());
        let created: ProfileResponse = read_json(create(&app, &body).await).await;

        let update = DonorProfileInput {
            available: Some(false),
            ..Default::default()
        };
        let uri = format!("/api/donor-profile/{}", created.profile.id);
        let res = send_json(&app, Method::PUT, &uri, &update).await;
        assert_eq!(res.status(), StatusCode::OK);
        let updated: ProfileResponse = read_json(res).await;
        assert!(!updated.profile.available);
        assert_eq!(updated.profile.blood_type.as_deref(), Some("O+"));
        assert_eq!(updated.profile.contact_phone.as_deref(), Some("555-0100"));
        assert_eq!(updated.profile.user_id, user_id);
    }

    #[tokio::test]
    async fn test_update_with_empty_text_clears_fields() {
        let (app, state, _dir) = test_app();
        let user_id = add_user(&state, "d@example.com", "Albany").await;
        let mut body = input(user_id, "O+", true);
        body.sickness = Some("flu".into());
        body.medication = Some("antibiotics".into());
        body.donation_number = Some(FieldValue::from(2i64));
        let created: ProfileResponse = read_json(create(&app, &body).await).await;
        assert_eq!(created.profile.sickness.as_deref(), Some("flu"));

        // The dashboard sends the whole form back, blanks included.
        let mut update = DonorProfileInput::from(&created.profile);
        update.sickness = Some(String::new());
        update.medication = Some("  ".into());
        update.donation_number = Some(FieldValue::from(""));
        let uri = format!("/api/donor-profile/{}", created.profile.id);
        let res = send_json(&app, Method::PUT, &uri, &update).await;
        assert_eq!(res.status(), StatusCode::OK);
        let updated: ProfileResponse = read_json(res).await;
        assert!(updated.profile.sickness.is_none());
        assert!(updated.profile.medication.is_none());
        assert!(updated.profile.donation_number.is_none());
        assert_eq!(updated.profile.blood_type.as_deref(), Some("O+"));

        let req = Request::get(format!("/api/donor-profile/{}", user_id))
            .body(Body::empty())
            .unwrap();
        let fetched: DonorProfile = read_json(app.oneshot(req).await.unwrap()).await;
        assert!(fetched.sickness.is_none());
        assert!(fetched.medication.is_none());
    }

    #[tokio::test]
    async fn test_update_unknown_profile_is_not_found() {
        let (app, _state, _dir) = test_app();
        let update = DonorProfileInput {
            available: Some(false),
            ..Default::default()
        };
        for id in [Uuid::new_v4().to_string(), "not-an-id".to_string()] {
            let uri = format!("/api/donor-profile/{}", id);
            let res = send_json(&app, Method::PUT, &uri, &update).await;
            assert_eq!(res.status(), StatusCode::NOT_FOUND);
            let err: ErrorResponse = read_json(res).await;
            assert_eq!(err.error, "ProfileNotFound");
        }
    }

    #[tokio::test]
    async fn test_get_missing_profile_is_not_found() {
        let (app, _state, _dir) = test_app();
        let req = Request::get(format!("/api/donor-profile/{}", Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_search_filters_combine() {
        let (app, state, _dir) = test_app();
        let albany = add_user(&state, "a@example.com", "Albany").await;
        let boston = add_user(&state, "b@example.com", "Boston").await;
        let albany_two = add_user(&state, "c@example.com", "Albany").await;
        create(&app, &input(albany, "O+", true)).await;
        create(&app, &input(boston, "O+", false)).await;
        create(&app, &input(albany_two, "A-", true)).await;

        assert_eq!(list(&app, "").await.len(), 3);
        assert_eq!(list(&app, "?bloodType=all").await.len(), 3);

        let o_pos = list(&app, "?bloodType=O%2B").await;
        assert_eq!(o_pos.len(), 2);
        assert!(o_pos.iter().all(|d| d.profile.blood_type.as_deref() == Some("O+")));

        let available = list(&app, "?bloodType=O%2B&availableOnly=true").await;
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].profile.user_id, albany);
        assert_eq!(available[0].location.as_deref(), Some("Albany"));

        let by_place = list(&app, "?searchTerm=ALBA").await;
        assert_eq!(by_place.len(), 2);
        assert_eq!(by_place[0].profile.user_id, albany);
        assert_eq!(by_place[1].profile.user_id, albany_two);

        assert!(list(&app, "?searchTerm=nowhere").await.is_empty());
        assert_eq!(list(&app, "?availableOnly=false").await.len(), 3);
    }
}
