//! Application configuration loaded from environment variables.
//!
//! Every setting has a development default so the server starts with no
//! configuration at all: in-process store, permissive secret, uploads under
//! `./uploads`.

use std::path::PathBuf;

use crate::db::DbConfig;

/// Secret used when `JWT_SECRET` is unset. Refused in production.
pub const DEFAULT_JWT_SECRET: &str = "default-jwt-secret-change-in-production";

const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Env: `ENVIRONMENT` (`development` | `production`)
    pub environment: String,

    /// Env: `HOST`, default `127.0.0.1`
    pub host: String,

    /// Env: `PORT`, default `5000`
    pub port: u16,

    /// Single origin allowed by CORS.
    /// Env: `FRONTEND_ORIGIN`, default `http://localhost:8080`
    pub frontend_origin: String,

    /// `None` when `DATABASE_URL` is unset; the in-process store is used then.
    pub database: Option<DbConfig>,

    /// Env: `JWT_SECRET`
    pub jwt_secret: String,

    /// Session token lifetime.
    /// Env: `TOKEN_TTL_HOURS`, default `24`
    pub token_ttl_hours: i64,

    /// Env: `BCRYPT_COST`, default `10`
    pub bcrypt_cost: u32,

    /// Directory for profile images, served under `/uploads`.
    /// Env: `UPLOAD_DIR`, default `uploads`
    pub upload_dir: PathBuf,

    /// Env: `MAX_UPLOAD_BYTES`, default 5 MiB
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            host: "127.0.0.1".to_string(),
            port: 5000,
            frontend_origin: "http://localhost:8080".to_string(),
            database: None,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            token_ttl_hours: 24,
            bcrypt_cost: 10,
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 5 * 1024 * 1024,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(environment) = std::env::var("ENVIRONMENT") {
            config.environment = environment;
        }
        if let Ok(host) = std::env::var("HOST") {
            config.host = host;
        }
        config.port = env_parse("PORT", config.port);

        if let Ok(origin) = std::env::var("FRONTEND_ORIGIN") {
            config.frontend_origin = origin;
        }

        if std::env::var("DATABASE_URL").is_ok() {
            config.database = Some(DbConfig::default());
        }

        if let Ok(secret) = std::env::var("JWT_SECRET") {
            config.jwt_secret = secret;
        }
        config.token_ttl_hours = env_parse("TOKEN_TTL_HOURS", config.token_ttl_hours);

        let cost = env_parse("BCRYPT_COST", config.bcrypt_cost);
        if (MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
            config.bcrypt_cost = cost;
        } else {
            tracing::warn!(cost, "BCRYPT_COST out of range, using default");
        }

        if let Ok(dir) = std::env::var("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }
        config.max_upload_bytes = env_parse("MAX_UPLOAD_BYTES", config.max_upload_bytes);

        config
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Reject settings that must never reach production.
    pub fn check_production(&self) -> Result<(), String> {
        if !self.is_production() {
            return Ok(());
        }
        if self.jwt_secret.is_empty() || self.jwt_secret == DEFAULT_JWT_SECRET {
            return Err(
                "JWT_SECRET must be set to a secure, unique value in production".to_string(),
            );
        }
        if self.database.is_none() {
            tracing::warn!(
                "DATABASE_URL is not set in production; data will be lost on restart"
            );
        }
        Ok(())
    }

    /// Address string the listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse an env var, keeping `default` when it is unset or malformed.
pub(crate) fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
