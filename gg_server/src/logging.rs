//! Structured logging configuration.
//!
//! Library code logs through the `log` facade; `init` installs a `tracing`
//! subscriber that also captures those records.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,hyper=warn";

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var.
///
/// # Example
///
/// ```no_run
/// use gg_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // Console layer for development
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log a rejected game operation with structured data
///
/// # Arguments
///
/// * `operation` - Operation name
/// * `session_id` - Session the caller addressed
/// * `status_code` - HTTP status returned
/// * `message` - Client-facing error message
pub fn log_rejected_operation(operation: &str, session_id: &str, status_code: u16, message: &str) {
    if status_code >= 500 {
        tracing::error!(
            operation = operation,
            session_id = session_id,
            http_status = status_code,
            "Game operation failed: {}",
            message
        );
    } else {
        tracing::debug!(
            operation = operation,
            session_id = session_id,
            http_status = status_code,
            "Game operation rejected: {}",
            message
        );
    }
}
