/**
 * Routes Module
 * API route handlers and the state they share
 */
pub mod auth;
pub mod blood_requests;
pub mod donors;
pub mod events;
pub mod health;

use axum::extract::FromRequest;
use std::sync::Arc;

use crate::auth::TokenKeys;
use crate::config::AppConfig;
use crate::db::Store;
use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub tokens: TokenKeys,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: AppConfig) -> Self {
        Self {
            store,
            tokens: TokenKeys::new(&config.jwt_secret, config.token_ttl_hours),
            config: Arc::new(config),
        }
    }
}

/// `Json` extractor whose rejections are JSON `ApiError`s.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
