use crate::domain::BookValidationError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use super::types::ErrorResponse;

/// エラーメトリクスのラベル（api_errors_total の type）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Database,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Database => "database",
        }
    }
}

/// API層のエラー型
///
/// Display の文字列がそのままクライアントへのメッセージになる。
/// Database の原因はログにのみ記録し、レスポンスには含めない。
#[derive(Debug, Error)]
pub enum ApiError {
    /// パスのIDが整数でない
    #[error("Invalid book ID")]
    InvalidId,

    /// リクエストボディがJSONとしてデコードできない
    #[error("Invalid request body")]
    InvalidBody(#[source] serde_json::Error),

    /// 必須フィールドの欠落
    #[error(transparent)]
    Validation(#[from] BookValidationError),

    /// 該当する書籍がない
    #[error("Book not found")]
    NotFound,

    /// ルーティング: メソッドが許可されていない
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// ルーティング: パスが存在しない
    #[error("Not found")]
    RouteNotFound,

    /// ストア障害
    #[error("{message}")]
    Database {
        message: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ApiError {
    pub fn database(
        message: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        ApiError::Database { message, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidId | ApiError::InvalidBody(_) | ApiError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// エラーカウンタの種別。ルーティングエラーは計上しない。
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ApiError::InvalidId | ApiError::InvalidBody(_) | ApiError::Validation(_) => {
                Some(ErrorKind::Validation)
            }
            ApiError::NotFound => Some(ErrorKind::NotFound),
            ApiError::Database { .. } => Some(ErrorKind::Database),
            ApiError::MethodNotAllowed | ApiError::RouteNotFound => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
        if let ApiError::Database { message, ref source } = self {
            tracing::error!("{}: {}", message, source);
        }

        let body = Json(ErrorResponse::new(self.to_string()));
        (self.status(), body).into_response()
    }
}
