use thiserror::Error;

/// 書籍のバリデーションエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookValidationError {
    /// タイトルまたは著者が空
    #[error("Title and Author are required")]
    MissingTitleOrAuthor,
}
