/**
 * API Client
 * Typed HTTP client for the BloodLink API plus the client-side session and
 * page state built on it
 */
pub mod session;
pub mod views;

pub use session::{Dashboard, SessionStore, SESSION_FILE};
pub use views::{BloodRequestBoard, DonorDashboard, DonorSearch, EventBoard};

use reqwest::{multipart, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::{
    AccountType, BloodRequest, BloodRequestInput, DonorListing, DonorProfile, DonorProfileInput,
    Event, EventInput,
};
use crate::error::ErrorResponse;
use crate::routes::auth::{LoginRequest, LoginResponse, RegisterResponse, PROFILE_IMAGE_FIELD};
use crate::routes::donors::{DonorSearchQuery, ProfileResponse};
use crate::routes::health::SimpleHealthResponse;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with an error body.
    #[error("{status}: {}", .body.message)]
    Api { status: StatusCode, body: ErrorResponse },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("session file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session file is not valid JSON: {0}")]
    SessionFormat(#[from] serde_json::Error),

    #[error("token could not be decoded: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("no donor profile has been saved yet")]
    NoProfile,
}

impl ClientError {
    /// Error kind from the response body, e.g. `"ProfileNotFound"`.
    pub fn kind(&self) -> Option<&str> {
        match self {
            ClientError::Api { body, .. } => Some(body.error.as_str()),
            _ => None,
        }
    }
}

/// Profile image attached to a registration.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Registration form as the client fills it in.
#[derive(Debug, Clone)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub location: String,
    pub account_type: AccountType,
    pub profile_image: Option<ImageUpload>,
}

impl RegisterForm {
    fn into_multipart(self) -> multipart::Form {
        let form = multipart::Form::new()
            .text("name", self.name)
            .text("email", self.email)
            .text("password", self.password)
            .text("location", self.location)
            .text("accountType", self.account_type.as_str());

        match self.profile_image {
            Some(image) => form.part(
                PROFILE_IMAGE_FIELD,
                multipart::Part::bytes(image.bytes).file_name(image.file_name),
            ),
            None => form,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// `base_url` is the server root, e.g. `http://localhost:5000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Decode a success body, or turn the error body into [`ClientError::Api`].
    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let text = response.text().await?;
        let body = serde_json::from_str::<ErrorResponse>(&text).unwrap_or_else(|_| ErrorResponse {
            error: "Unknown".to_string(),
            message: if text.is_empty() {
                status.to_string()
            } else {
                text
            },
            errors: None,
        });
        tracing::debug!(%status, kind = %body.error, "api error");
        Err(ClientError::Api { status, body })
    }

    pub async fn health(&self) -> Result<SimpleHealthResponse, ClientError> {
        let res = self.http.get(self.url("/health")).send().await?;
        Self::decode(res).await
    }

    pub async fn register(&self, form: RegisterForm) -> Result<RegisterResponse, ClientError> {
        let res = self
            .http
            .post(self.url("/api/register"))
            .multipart(form.into_multipart())
            .send()
            .await?;
        Self::decode(res).await
    }

    /// Returns the session token on success.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let res = self
            .http
            .post(self.url("/api/login"))
            .json(&body)
            .send()
            .await?;
        Self::decode(res).await
    }

    /// `None` when the user has not created a profile yet.
    pub async fn donor_profile_for(&self, user_id: Uuid) -> Result<Option<DonorProfile>, ClientError> {
        let res = self
            .http
            .get(self.url(&format!("/api/donor-profile/{}", user_id)))
            .send()
            .await?;
        match Self::decode::<DonorProfile>(res).await {
            Ok(profile) => Ok(Some(profile)),
            Err(e) if e.kind() == Some("ProfileNotFound") => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create_donor_profile(
        &self,
        input: &DonorProfileInput,
    ) -> Result<DonorProfile, ClientError> {
        let res = self
            .http
            .post(self.url("/api/donor-profile"))
            .json(input)
            .send()
            .await?;
        Ok(Self::decode::<ProfileResponse>(res).await?.profile)
    }

    pub async fn update_donor_profile(
        &self,
        id: Uuid,
        input: &DonorProfileInput,
    ) -> Result<DonorProfile, ClientError> {
        let res = self
            .http
            .put(self.url(&format!("/api/donor-profile/{}", id)))
            .json(input)
            .send()
            .await?;
        Ok(Self::decode::<ProfileResponse>(res).await?.profile)
    }

    pub async fn search_donors(
        &self,
        query: &DonorSearchQuery,
    ) -> Result<Vec<DonorListing>, ClientError> {
        let res = self
            .http
            .get(self.url("/api/donors"))
            .query(query)
            .send()
            .await?;
        Self::decode(res).await
    }

    pub async fn blood_requests(&self) -> Result<Vec<BloodRequest>, ClientError> {
        let res = self.http.get(self.url("/api/blood-requests")).send().await?;
        Self::decode(res).await
    }

    pub async fn create_blood_request(
        &self,
        input: &BloodRequestInput,
    ) -> Result<BloodRequest, ClientError> {
        let res = self
            .http
            .post(self.url("/api/blood-requests"))
            .json(input)
            .send()
            .await?;
        Self::decode(res).await
    }

    pub async fn events(&self) -> Result<Vec<Event>, ClientError> {
        let res = self.http.get(self.url("/api/events")).send().await?;
        Self::decode(res).await
    }

    pub async fn create_event(&self, input: &EventInput) -> Result<Event, ClientError> {
        let res = self
            .http
            .post(self.url("/api/events"))
            .json(input)
            .send()
            .await?;
        Self::decode(res).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:5000/");
        assert_eq!(client.base_url(), "http://localhost:5000");
        assert_eq!(client.url("/api/events"), "http://localhost:5000/api/events");
    }

    #[test]
    fn test_error_kind_only_for_api_errors() {
        let err = ClientError::Api {
            status: StatusCode::NOT_FOUND,
            body: ErrorResponse {
                error: "ProfileNotFound".to_string(),
                message: "Donor profile not found".to_string(),
                errors: None,
            },
        };
        assert_eq!(err.kind(), Some("ProfileNotFound"));
        assert!(err.to_string().contains("Donor profile not found"));
        assert_eq!(ClientError::NoProfile.kind(), None);
    }
}
