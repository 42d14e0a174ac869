/**
 * Authentication Routes
 * Multipart registration and password login issuing a session token
 */
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::{hash_password, verify_password};
use crate::db::models::{NewUser, RegisterInput, UserInfo};
use crate::db::{StoreError, UniqueField};
use crate::error::ApiError;
use crate::routes::{ApiJson, AppState};
use crate::uploads::{self, IncomingImage};
use crate::validation;

/// Multipart field carrying the optional avatar.
pub const PROFILE_IMAGE_FIELD: &str = "profileImage";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserInfo,
}

// ============================================================================
// Helpers
// ============================================================================

/// Split the multipart form into text fields and the optional image.
async fn read_register_form(
    mut multipart: Multipart,
) -> Result<(RegisterInput, Option<IncomingImage>), ApiError> {
    let mut input = RegisterInput::default();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == PROFILE_IMAGE_FIELD {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read file data: {}", e)))?;
            // Browsers send an empty part when no file was picked.
            if !file_name.is_empty() || !bytes.is_empty() {
                image = Some(IncomingImage {
                    field: name,
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read field {}: {}", name, e)))?;
        match name.as_str() {
            "name" => input.name = Some(value),
            "email" => input.email = Some(value),
            "password" => input.password = Some(value),
            "location" => input.location = Some(value),
            "accountType" => input.account_type = Some(value),
            other => tracing::debug!(field = %other, "ignoring unknown register field"),
        }
    }

    Ok((input, image))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/register
pub async fn register(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let (input, image) = read_register_form(multipart).await?;
    let registration = validation::registration(input)?;

    if let Some(image) = &image {
        uploads::check_image(image, state.config.max_upload_bytes)?;
    }

    // Fast path; the unique index still decides under concurrency.
    if state
        .store
        .find_user_by_email(&registration.email)
        .await?
        .is_some()
    {
        return Err(ApiError::DuplicateEmail);
    }

    let password_hash = hash_password(registration.password, state.config.bcrypt_cost).await?;

    let stored_image = match &image {
        Some(image) => Some(
            uploads::save_image(&state.config.upload_dir, image, state.config.max_upload_bytes)
                .await?,
        ),
        None => None,
    };

    let new_user = NewUser {
        name: registration.name,
        email: registration.email,
        password_hash,
        location: registration.location,
        account_type: registration.account_type,
        profile_image: stored_image.as_ref().map(|img| img.url.clone()),
    };

    let user = match state.store.insert_user(new_user).await {
        Ok(user) => user,
        Err(e) => {
            if let Some(img) = &stored_image {
                uploads::discard_image(img).await;
            }
            return Err(match e {
                StoreError::Conflict(UniqueField::UserEmail) => ApiError::DuplicateEmail,
                other => other.into(),
            });
        }
    };

    tracing::info!(user_id = %user.id, account_type = %user.account_type, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".to_string(),
            user: UserInfo::from(&user),
        }),
    ))
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = validation::normalize_email(&payload.email);
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::InvalidCredentials);
    }

    let user = match state.store.find_user_by_email(&email).await? {
        Some(user) => user,
        None => {
            tracing::warn!("Login attempt for unknown user");
            return Err(ApiError::InvalidCredentials);
        }
    };

    if !verify_password(payload.password, user.password_hash.clone()).await {
        tracing::warn!(user_id = %user.id, "Failed login attempt");
        return Err(ApiError::InvalidCredentials);
    }

    let token = state
        .tokens
        .issue(&user)
        .map_err(|e| ApiError::Internal(format!("failed to create token: {}", e)))?;

    tracing::info!(user_id = %user.id, "Successful login");

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        token,
    }))
}
