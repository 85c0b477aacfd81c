use crate::domain::{Book, BookId, BookInput};
use crate::observability::Metrics;
use crate::ports::BookRepository;
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::{
    error::{ApiError, ErrorKind},
    router::{self, ENDPOINT_BOOK, ENDPOINT_BOOKS, ENDPOINT_HEALTH, Route},
    types::{HealthResponse, MessageResponse},
};

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub books: Arc<dyn BookRepository>,
    pub metrics: Arc<Metrics>,
}

// ============================================================================
// Dispatch
// ============================================================================

/// /books 配下のすべてのリクエストの入口
///
/// メソッドとIDの有無でハンドラーを選び、結果をレスポンスに変換する。
/// 失敗時はレスポンスを返す前にエラーカウンタを必ず1回だけ加算する。
pub async fn dispatch_books(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    match router::resolve(&method, uri.path()) {
        Route::ListBooks => respond(&state, ENDPOINT_BOOKS, list_books(&state).await),
        Route::GetBook(id) => respond(&state, ENDPOINT_BOOK, get_book(&state, id).await),
        Route::CreateBook => respond(&state, ENDPOINT_BOOKS, create_book(&state, &body).await),
        Route::UpdateBook(id) => {
            respond(&state, ENDPOINT_BOOK, update_book(&state, id, &body).await)
        }
        Route::DeleteBook(id) => respond(&state, ENDPOINT_BOOK, delete_book(&state, id).await),
        Route::MethodNotAllowed => ApiError::MethodNotAllowed.into_response(),
        Route::NotFound => ApiError::RouteNotFound.into_response(),
    }
}

fn respond<T: IntoResponse>(
    state: &AppState,
    endpoint: &'static str,
    result: Result<T, ApiError>,
) -> Response {
    match result {
        Ok(response) => response.into_response(),
        Err(err) => {
            record_error(&state.metrics, endpoint, &err);
            err.into_response()
        }
    }
}

fn record_error(metrics: &Metrics, endpoint: &'static str, err: &ApiError) {
    let Some(kind) = err.kind() else {
        return;
    };
    if kind == ErrorKind::Validation {
        metrics.record_validation_error();
    }
    metrics.record_api_error(kind.as_str(), endpoint);
}

fn parse_id(segment: &str) -> Result<BookId, ApiError> {
    segment.parse().map_err(|_| ApiError::InvalidId)
}

fn parse_body(body: &[u8]) -> Result<BookInput, ApiError> {
    serde_json::from_slice(body).map_err(ApiError::InvalidBody)
}

// ============================================================================
// Query handlers (GET)
// ============================================================================

/// GET /books - 全書籍をIDの降順で取得
///
/// 取得件数で api_books_total ゲージを上書きする。
pub async fn list_books(state: &AppState) -> Result<Json<Vec<Book>>, ApiError> {
    let books = state
        .books
        .list_all()
        .await
        .map_err(|e| ApiError::database("Error fetching books", e))?;

    state.metrics.set_books_total(books.len());
    Ok(Json(books))
}

/// GET /books/:id - 書籍をIDで取得
pub async fn get_book(state: &AppState, id: &str) -> Result<Json<Book>, ApiError> {
    let id = parse_id(id)?;

    state
        .books
        .get_by_id(id)
        .await
        .map_err(|e| ApiError::database("Error fetching book", e))?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

// ============================================================================
// Command handlers (POST / PUT / DELETE)
// ============================================================================

/// POST /books - 書籍を作成
///
/// 強制されるビジネスルール:
/// - タイトルと著者が空でないこと
pub async fn create_book(
    state: &AppState,
    body: &[u8],
) -> Result<(StatusCode, Json<Book>), ApiError> {
    let input = parse_body(body)?;
    input.validate_for_create()?;

    let book = state
        .books
        .create(input)
        .await
        .map_err(|e| ApiError::database("Error creating book", e))?;

    state.metrics.book_created();
    tracing::debug!(book_id = book.id, "book created");

    Ok((StatusCode::CREATED, Json(book)))
}

/// PUT /books/:id - 書籍を上書き更新
///
/// ボディで省略されたフィールドは空文字列・0で上書きされる。
pub async fn update_book(state: &AppState, id: &str, body: &[u8]) -> Result<Json<Book>, ApiError> {
    let id = parse_id(id)?;
    let input = parse_body(body)?;

    let book = state
        .books
        .update(id, input)
        .await
        .map_err(|e| ApiError::database("Error updating book", e))?
        .ok_or(ApiError::NotFound)?;

    state.metrics.book_updated();
    tracing::debug!(book_id = book.id, "book updated");

    Ok(Json(book))
}

/// DELETE /books/:id - 書籍を削除
pub async fn delete_book(state: &AppState, id: &str) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(id)?;

    let affected = state
        .books
        .delete(id)
        .await
        .map_err(|e| ApiError::database("Error deleting book", e))?;

    if affected == 0 {
        return Err(ApiError::NotFound);
    }

    state.metrics.book_deleted();
    tracing::debug!(book_id = id, "book deleted");

    Ok(Json(MessageResponse::new("Book deleted successfully")))
}

// ============================================================================
// Operational endpoints
// ============================================================================

/// GET /health - ストアへの疎通確認
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    match state.books.ping().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse::healthy())).into_response(),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            state
                .metrics
                .record_api_error(ErrorKind::Database.as_str(), ENDPOINT_HEALTH);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse::unhealthy(e.to_string())),
            )
                .into_response()
        }
    }
}

/// GET /metrics - Prometheus テキスト形式でメトリクスを出力
pub async fn export_metrics(State(state): State<Arc<AppState>>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
        .into_response()
}
