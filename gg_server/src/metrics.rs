//! Prometheus metrics for the game server.
//!
//! Metrics are exposed in Prometheus text format at `http://<addr>/metrics`
//! once [`init_metrics`] has installed the exporter. Without an exporter the
//! recording functions are no-ops.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use gg_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::sessions_created_total();
//! metrics::guesses_total("continue");
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// # Arguments
///
/// - `addr`: Address to bind the metrics server to (e.g., `0.0.0.0:9090`)
///
/// # Returns
///
/// Result indicating success or error message
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Game Metrics
// ============================================================================

/// Increment sessions created counter.
pub fn sessions_created_total() {
    metrics::counter!("sessions_created_total").increment(1);
}

/// Increment players joined counter.
pub fn players_joined_total() {
    metrics::counter!("players_joined_total").increment(1);
}

/// Increment accepted guesses counter, labelled `continue` or `won`.
pub fn guesses_total(outcome: &'static str) {
    metrics::counter!("guesses_total", "outcome" => outcome).increment(1);
}

/// Increment rejected guesses counter, labelled by HTTP status.
pub fn guesses_rejected_total(status: u16) {
    metrics::counter!("guesses_rejected_total", "status" => status.to_string()).increment(1);
}

/// Increment rounds won counter.
pub fn rounds_won_total() {
    metrics::counter!("rounds_won_total").increment(1);
}

/// Tracks one long-poll waiter in the `event_waiters_active` gauge.
///
/// The gauge is incremented on creation and decremented on drop, so
/// waiters abandoned by a client disconnect are still accounted for.
pub struct WaiterGuard(());

impl WaiterGuard {
    pub fn new() -> Self {
        metrics::gauge!("event_waiters_active").increment(1.0);
        Self(())
    }
}

impl Default for WaiterGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        metrics::gauge!("event_waiters_active").decrement(1.0);
    }
}
