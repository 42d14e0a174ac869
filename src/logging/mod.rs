/*!
 * Logging Module
 * Subscriber setup and request logging middleware
 */
pub mod middleware;

use std::io;
use std::path::PathBuf;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter used when `RUST_LOG` is unset.
fn default_filter(log_level: &str) -> String {
    format!(
        "bloodlink_backend={},tower_http=debug,axum=debug,sqlx=warn",
        log_level
    )
}

/// Initialize the logging system.
///
/// The returned guards flush the background writers on drop; hold them for
/// the lifetime of the process.
pub fn init() -> Vec<WorkerGuard> {
    let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
    let is_production = environment == "production";

    let log_dir = PathBuf::from(std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()));
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("failed to create log directory {}: {}", log_dir.display(), e);
    }

    // File appender for all logs
    let (file_writer, file_guard) = non_blocking(rolling::daily(&log_dir, "app.log"));

    // File appender for errors only
    let (error_writer, error_guard) = non_blocking(rolling::daily(&log_dir, "error.log"));

    let (console_writer, console_guard) = non_blocking(io::stdout());

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| {
        if is_production {
            "info".to_string()
        } else {
            "debug".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(&log_level)));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    let result = if is_production {
        // JSON format for production
        let file_layer = fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        let error_layer = fmt::layer()
            .json()
            .with_writer(error_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

        let console_layer = fmt::layer()
            .json()
            .with_writer(console_writer)
            .with_target(false);

        subscriber
            .with(file_layer)
            .with(error_layer)
            .with(console_layer)
            .try_init()
    } else {
        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        let error_layer = fmt::layer()
            .with_writer(error_writer)
            .with_ansi(false)
            .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

        let console_layer = fmt::layer()
            .with_writer(console_writer)
            .with_target(true)
            .pretty();

        subscriber
            .with(file_layer)
            .with(error_layer)
            .with(console_layer)
            .try_init()
    };

    match result {
        Ok(()) => tracing::info!("Logging initialized for {} environment", environment),
        Err(e) => eprintln!("logging already initialized: {}", e),
    }

    vec![file_guard, error_guard, console_guard]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_targets_crate() {
        let filter = default_filter("info");
        assert!(filter.starts_with("bloodlink_backend=info"));
        assert!(EnvFilter::try_new(filter).is_ok());
    }
}
