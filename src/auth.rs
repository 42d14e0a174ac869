/**
 * Authentication
 * bcrypt password hashing and JWT session tokens
 */
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::{AccountType, User};
use crate::error::ApiError;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub id: Uuid,
    pub email: String,
    pub account_type: AccountType,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }
}

/// Signs and verifies session tokens with one shared secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours.max(1)),
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            id: user.id,
            email: user.email.clone(),
            account_type: user.account_type,
            name: user.name.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    /// Checks signature and expiry.
    ///
    /// No route requires a token yet. This is the check an authenticated
    /// route runs on its bearer token.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }
}

/// Read the claims without checking the signature or expiry.
///
/// Only for display on the client, which never holds the secret.
pub fn decode_unverified(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}

/// bcrypt is CPU-bound; hash on the blocking pool.
pub async fn hash_password(password: String, cost: u32) -> Result<String, ApiError> {
    match tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await {
        Ok(Ok(hash)) => Ok(hash),
        Ok(Err(e)) => Err(ApiError::Internal(format!("failed to hash password: {}", e))),
        Err(e) => Err(ApiError::Internal(format!("hash task failed: {}", e))),
    }
}

/// A malformed stored hash counts as a mismatch.
pub async fn verify_password(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .unwrap_or(false)
}
