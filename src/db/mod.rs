pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{Store, StoreError, UniqueField};

use sqlx::{postgres::PgPoolOptions, PgPool};

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/bloodlink".to_string()),
            max_connections: crate::config::env_parse("DB_POOL_MAX", 10),
            min_connections: crate::config::env_parse("DB_POOL_MIN", 2),
            connect_timeout_secs: crate::config::env_parse("DB_CONNECT_TIMEOUT", 10),
            idle_timeout_secs: crate::config::env_parse("DB_IDLE_TIMEOUT", 300),
        }
    }
}

/// Mask everything but the scheme/host punctuation so credentials never hit the logs.
fn redact_url(url: &str) -> String {
    url.replace(
        |c: char| !c.is_ascii_alphanumeric() && c != ':' && c != '/' && c != '@' && c != '.',
        "*",
    )
    .split('@')
    .last()
    .unwrap_or_default()
    .to_string()
}

pub async fn init_pool(config: &DbConfig) -> Result<PgPool, sqlx::Error> {
    tracing::info!("Initializing database connection pool...");
    tracing::debug!("Database host: {}", redact_url(&config.url));

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(std::time::Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(std::time::Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    tracing::info!("Database connection pool initialized successfully");

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            location TEXT NOT NULL,
            account_type TEXT NOT NULL CHECK (account_type IN ('donor', 'recipient')),
            profile_image TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS users_email_key ON users(email)")
        .execute(pool)
        .await?;

    // user_id is a soft reference: no foreign key, but one profile per user.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS donor_profiles (
            id UUID PRIMARY KEY,
            user_id UUID NOT NULL,
            age TEXT,
            blood_type TEXT,
            last_donation TEXT,
            sickness TEXT,
            medication TEXT,
            donation_type TEXT CHECK (donation_type IN ('paid', 'unpaid')),
            available BOOLEAN NOT NULL DEFAULT true,
            contact_phone TEXT,
            donation_number BIGINT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS donor_profiles_user_id_key
            ON donor_profiles(user_id)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_donor_profiles_blood_type
            ON donor_profiles(blood_type)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS blood_requests (
            id UUID PRIMARY KEY,
            organization_name TEXT NOT NULL,
            blood_type TEXT NOT NULL,
            location TEXT NOT NULL,
            contact_number TEXT NOT NULL,
            price DOUBLE PRECISION NOT NULL,
            urgency TEXT NOT NULL CHECK (urgency IN ('high', 'medium', 'low')),
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id UUID PRIMARY KEY,
            title TEXT NOT NULL,
            date TIMESTAMPTZ NOT NULL,
            location TEXT NOT NULL,
            description TEXT NOT NULL,
            event_type TEXT NOT NULL CHECK (event_type IN ('blood_donation', 'awareness')),
            expected_attendees BIGINT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");

    Ok(())
}
