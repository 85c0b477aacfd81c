use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::BookValidationError;

/// 書籍ID - ストアが採番する連番
pub type BookId = i64;

/// 書籍エンティティ
///
/// id と2つのタイムスタンプはストア側で付与される。
/// created_at は作成後不変、updated_at は更新のたびに進む。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 作成・更新リクエストのペイロード
///
/// 省略されたフィールドは空文字列・0として扱う（部分更新はサポートしない）。
/// id, created_at, updated_at がボディに含まれていても無視される。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub isbn: String,
    #[serde(default)]
    pub price: f64,
}

impl BookInput {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            ..Self::default()
        }
    }

    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = isbn.into();
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    /// 新規作成時のバリデーション
    ///
    /// ビジネスルール: タイトルと著者は必須（空文字列不可）。
    /// 更新時には適用しない。
    pub fn validate_for_create(&self) -> Result<(), BookValidationError> {
        if self.title.is_empty() || self.author.is_empty() {
            return Err(BookValidationError::MissingTitleOrAuthor);
        }
        Ok(())
    }
}
