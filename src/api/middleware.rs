//! Request-processing stages wrapped around every routed handler.
//!
//! Applied outermost first: [`track_requests`] then [`cors`]. The CORS stage
//! may answer a request on its own (preflight), in which case the handler is
//! never called but the request is still logged and counted.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::router::endpoint_label;
use crate::observability::Metrics;

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type";

/// Holds one unit of the in-flight gauge; released on drop.
///
/// Dropping covers normal completion, early return, panic unwind and a
/// cancelled request future alike.
pub struct InFlightGuard {
    metrics: Arc<Metrics>,
}

impl InFlightGuard {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        metrics.request_started();
        Self { metrics }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.metrics.request_finished();
    }
}

/// Logs each request and records HTTP metrics.
///
/// The status is whatever the inner stack produced; axum responses default
/// to 200 when a handler does not set one.
pub async fn track_requests(
    State(metrics): State<Arc<Metrics>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let endpoint = endpoint_label(uri.path());

    let response = {
        let _in_flight = InFlightGuard::new(metrics.clone());
        next.run(request).await
    };

    let elapsed = start.elapsed();
    let status = response.status().as_u16();
    metrics.observe_http_request(method.as_str(), endpoint, status, elapsed);

    tracing::info!(
        method = %method,
        uri = %uri,
        status,
        duration = ?elapsed,
        "request completed"
    );

    response
}

/// Sets the fixed CORS headers; answers `OPTIONS` with an empty 200.
pub async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    apply_cors_headers(response.headers_mut());
    response
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(ALLOW_ORIGIN),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
}
