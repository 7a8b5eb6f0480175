use messaging::ErrorCategory;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArticleError {
    #[error("Article not found: {0}")]
    NotFound(i32),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Database error: {0}")]
    Database(String),
}

pub type ArticleResult<T> = Result<T, ArticleError>;

impl ArticleError {
    /// Only storage failures are worth redelivering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ArticleError::Database(_) => ErrorCategory::Transient,
            ArticleError::NotFound(_) | ArticleError::Validation(_) | ArticleError::Decode(_) => {
                ErrorCategory::Permanent
            }
        }
    }
}

impl From<sea_orm::DbErr> for ArticleError {
    fn from(err: sea_orm::DbErr) -> Self {
        ArticleError::Database(err.to_string())
    }
}
