use axum::{
    Router,
    http::{Method, StatusCode},
    middleware,
    routing::{any, get},
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;

use super::handlers::{AppState, dispatch_books, export_metrics, health_check};
use super::middleware::{cors, track_requests};

/// Resource prefix for the books collection.
const BOOKS_PREFIX: &str = "/books";

/// Bounded metric labels for request paths.
pub const ENDPOINT_HEALTH: &str = "/health";
pub const ENDPOINT_METRICS: &str = "/metrics";
pub const ENDPOINT_BOOKS: &str = "/books";
pub const ENDPOINT_BOOK: &str = "/books/{id}";
pub const ENDPOINT_UNMATCHED: &str = "unmatched";

/// Handler selected for a request.
///
/// Identifier-carrying routes hold the raw path segment; parsing it is the
/// handler's job so a malformed identifier becomes a 400, not a 404.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    ListBooks,
    GetBook(&'a str),
    CreateBook,
    UpdateBook(&'a str),
    DeleteBook(&'a str),
    MethodNotAllowed,
    NotFound,
}

/// Splits a books path into its identifier segment.
///
/// - `/books`, `/books/` → `Some(None)` (collection)
/// - `/books/<rest>` → `Some(Some(rest))`, `rest` taken verbatim
/// - anything else → `None`
fn book_id_segment(path: &str) -> Option<Option<&str>> {
    match path.strip_prefix(BOOKS_PREFIX)? {
        "" | "/" => Some(None),
        rest => rest.strip_prefix('/').map(Some),
    }
}

/// Resolves a request to a [`Route`] from its method and whether the path
/// carries an identifier.
pub fn resolve<'a>(method: &Method, path: &'a str) -> Route<'a> {
    let Some(id) = book_id_segment(path) else {
        return Route::NotFound;
    };

    match (method.as_str(), id) {
        ("GET", None) => Route::ListBooks,
        ("GET", Some(id)) => Route::GetBook(id),
        ("POST", None) => Route::CreateBook,
        ("PUT", Some(id)) => Route::UpdateBook(id),
        ("DELETE", Some(id)) => Route::DeleteBook(id),
        _ => Route::MethodNotAllowed,
    }
}

/// Maps a concrete request path to the label used on HTTP metrics.
pub fn endpoint_label(path: &str) -> &'static str {
    match path {
        ENDPOINT_HEALTH => ENDPOINT_HEALTH,
        ENDPOINT_METRICS => ENDPOINT_METRICS,
        _ => match book_id_segment(path) {
            Some(None) => ENDPOINT_BOOKS,
            Some(Some(_)) => ENDPOINT_BOOK,
            None => ENDPOINT_UNMATCHED,
        },
    }
}

/// Creates the API router
///
/// Endpoints:
/// - GET /health - Store connectivity check
/// - GET /books - List books (newest first)
/// - POST /books - Create a book
/// - GET /books/:id - Get a book
/// - PUT /books/:id - Replace a book
/// - DELETE /books/:id - Delete a book
/// - GET /metrics - Prometheus exposition (no logging/CORS wrapping)
///
/// Middleware, outermost first: request logging + metrics, CORS, timeout.
pub fn create_router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    let metrics_router = Router::new()
        .route(ENDPOINT_METRICS, get(export_metrics))
        .with_state(state.clone());

    Router::new()
        .route(ENDPOINT_HEALTH, any(health_check))
        .route(BOOKS_PREFIX, any(dispatch_books))
        .route("/books/*id", any(dispatch_books))
        // `/books/` and unknown paths; resolved (or rejected) by the dispatcher
        .fallback(dispatch_books)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn_with_state(
                    state.metrics.clone(),
                    track_requests,
                ))
                .layer(middleware::from_fn(cors))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    request_timeout,
                )),
        )
        .with_state(state)
        .merge(metrics_router)
}
