use serde::{Deserialize, Serialize};

/// エラーレスポンス
///
/// すべてのエラーは `{"error": "<message>"}` の形で返す。
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// 削除成功時などのメッセージレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// ヘルスチェックレスポンス（GET /health）
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub database: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthResponse {
    pub const SERVICE_NAME: &'static str = "book-api";

    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            service: Self::SERVICE_NAME.to_string(),
            database: "connected".to_string(),
            error: None,
        }
    }

    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            status: "unhealthy".to_string(),
            service: Self::SERVICE_NAME.to_string(),
            database: "disconnected".to_string(),
            error: Some(error.into()),
        }
    }
}
