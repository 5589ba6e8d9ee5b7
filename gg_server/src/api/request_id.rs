//! Request ID middleware for log correlation.

use axum::{
    extract::Request,
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::metrics;

/// Header name for request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Generate or extract request ID from headers
fn get_or_generate_request_id(headers: &axum::http::HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Middleware to add request ID to all requests and responses
///
/// Reuses the caller's `x-request-id` when present, echoes it on the
/// response and counts the request in `http_requests_total`.
///
/// # Example
///
/// ```no_run
/// use axum::{Router, routing::get, middleware};
/// use gg_server::api::request_id::request_id_middleware;
///
/// # async fn example() {
/// let app: Router = Router::new()
///     .route("/", get(|| async { "Hello" }))
///     .layer(middleware::from_fn(request_id_middleware));
/// # }
/// ```
pub async fn request_id_middleware(
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // Get or generate request ID
    let request_id = get_or_generate_request_id(request.headers());

    // Store request ID in request extensions for access by handlers
    request.extensions_mut().insert(RequestId(request_id.clone()));

    let method = request.method().clone();
    let path = request.uri().path().to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        uri = %request.uri(),
        "Request started"
    );

    let response = next.run(request).await;

    // Add request ID to response headers
    let (mut parts, body) = response.into_parts();
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        parts.headers.insert(REQUEST_ID_HEADER, header_value);
    }

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = %parts.status,
        "Request completed"
    );
    metrics::http_requests_total(method.as_str(), &route_label(&path), parts.status.as_u16());

    Ok(Response::from_parts(parts, body))
}

/// Collapse session ids out of a path so metric labels stay bounded
fn route_label(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Request ID wrapper stored in request extensions
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

impl RequestId {
    /// Get the request ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
