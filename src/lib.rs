//! BloodLink Backend - library for app logic, the HTTP client and testing

pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod routes;
pub mod uploads;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::db::{MemoryStore, PgStore, Store};
pub use crate::routes::AppState;

/// Slack on top of the image cap for the text fields of the register form.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// CORS for the single configured frontend origin, with credentials.
pub fn configure_cors(config: &AppConfig) -> CorsLayer {
    let origin = config
        .frontend_origin
        .parse::<HeaderValue>()
        .unwrap_or_else(|_| {
            tracing::warn!(
                origin = %config.frontend_origin,
                "FRONTEND_ORIGIN is not a valid header value, falling back to localhost"
            );
            HeaderValue::from_static("http://localhost:8080")
        });

    CorsLayer::new()
        .allow_origin([origin])
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors(&state.config);
    let body_limit = state.config.max_upload_bytes + FORM_OVERHEAD_BYTES;
    let upload_files = ServeDir::new(&state.config.upload_dir);

    Router::new()
        .route("/api/register", post(routes::auth::register))
        .route("/api/login", post(routes::auth::login))
        .route("/api/donor-profile", post(routes::donors::create_profile))
        .route(
            "/api/donor-profile/{id}",
            get(routes::donors::get_profile).put(routes::donors::update_profile),
        )
        .route("/api/donors", get(routes::donors::list_donors))
        .route(
            "/api/blood-requests",
            get(routes::blood_requests::list_requests).post(routes::blood_requests::create_request),
        )
        .route(
            "/api/events",
            get(routes::events::list_events).post(routes::events::create_event),
        )
        .route("/health", get(routes::health::health_ping))
        .route("/health/ready", get(routes::health::health_ready))
        .nest_service(uploads::UPLOAD_URL_PREFIX, upload_files)
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        // Multipart extraction has its own 2 MB default; lift it to the global cap.
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
}

/// Pick the store: Postgres when configured and reachable, otherwise memory.
pub async fn init_store(config: &AppConfig) -> Arc<dyn Store> {
    let Some(db_config) = &config.database else {
        tracing::info!("DATABASE_URL not set. Using in-memory store.");
        return Arc::new(MemoryStore::new());
    };

    match db::init_pool(db_config).await {
        Ok(pool) => {
            if let Err(e) = db::run_migrations(&pool).await {
                tracing::error!("Failed to run database migrations: {}", e);
            }
            Arc::new(PgStore::new(pool))
        }
        Err(e) => {
            tracing::warn!(
                "Failed to initialize database pool: {}. Continuing with in-memory store.",
                e
            );
            Arc::new(MemoryStore::new())
        }
    }
}

/// Run the server (used by main).
pub async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    // Guards must live until shutdown or buffered log lines are lost.
    let _log_guards = logging::init();

    routes::health::init_start_time();

    let config = AppConfig::from_env();
    config.check_production()?;

    let store = init_store(&config).await;
    let addr: SocketAddr = config.bind_addr().parse()?;
    let app = create_app(AppState::new(store, config));

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
