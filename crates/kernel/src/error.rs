//! Application error types.

use thiserror::Error;

use crate::listing::ListQueryError;
use crate::search::SearchError;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("internal error")]
    Internal(#[from] anyhow::Error),

    /// A lookup matched no rows. Carries the resource name.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid query: {0}")]
    InvalidQuery(#[from] ListQueryError),

    #[error("search unavailable: {0}")]
    SearchUnavailable(#[from] SearchError),

    /// Unique or foreign-key violation, message as reported by PostgreSQL.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("database error")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err
            && (db_err.is_unique_violation() || db_err.is_foreign_key_violation())
        {
            return AppError::ConstraintViolation(db_err.message().to_string());
        }
        AppError::Database(err)
    }
}

impl AppError {
    /// Whether the caller supplied something unusable (as opposed to a server fault).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::NotFound(_) | AppError::InvalidQuery(_) | AppError::ConstraintViolation(_)
        )
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;
