use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::auth::tokens::TokenError;
use crate::db::RepositoryError;
use crate::posts::{DeleteError, UploadError};
use crate::storage::ObjectStoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error(transparent)]
    Repository(RepositoryError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Delete(#[from] DeleteError),

    #[error(transparent)]
    ObjectStore(#[from] ObjectStoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(_) => AppError::NotFound,
            RepositoryError::Conflict(msg) => AppError::Conflict(msg),
            other => AppError::Repository(other),
        }
    }
}

fn internal(kind: &str, err: &dyn std::fmt::Display) -> (StatusCode, String) {
    tracing::error!("{}: {}", kind, err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::InvalidCredentials => (
                StatusCode::FORBIDDEN,
                "Email or password is incorrect".to_string(),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Database(e) => internal("Database error", e),
            AppError::Pool(e) => internal("Pool error", e),
            AppError::Repository(e) => internal("Repository error", e),
            AppError::Token(e) => match e {
                TokenError::InvalidSignature | TokenError::Expired | TokenError::AccountNotFound => {
                    tracing::debug!("Token rejected: {}", e);
                    (StatusCode::UNAUTHORIZED, e.to_string())
                }
                TokenError::Store(_) | TokenError::Signing(_) => internal("Token error", e),
            },
            AppError::Upload(e) => match e {
                UploadError::NoFileSupplied | UploadError::InvalidField(_) => {
                    (StatusCode::BAD_REQUEST, e.to_string())
                }
                UploadError::DuplicatePost(_)
                | UploadError::RecordInsertFailed {
                    source: RepositoryError::Conflict(_),
                    ..
                } => (StatusCode::CONFLICT, e.to_string()),
                UploadError::Lookup(_)
                | UploadError::ObjectStoreWriteFailed { .. }
                | UploadError::RecordInsertFailed { .. } => internal("Upload error", e),
            },
            AppError::Delete(e) => match e {
                DeleteError::InvalidField(_) => (StatusCode::BAD_REQUEST, e.to_string()),
                DeleteError::NotFound { .. } => (StatusCode::NOT_FOUND, e.to_string()),
                DeleteError::ObjectDeleteFailed { .. } | DeleteError::RecordDeleteFailed { .. } => {
                    internal("Delete error", e)
                }
            },
            AppError::ObjectStore(e) => match e {
                ObjectStoreError::InvalidKey(_) => (StatusCode::BAD_REQUEST, e.to_string()),
                ObjectStoreError::AlreadyExists(_) => (StatusCode::CONFLICT, e.to_string()),
                _ => internal("Object store error", e),
            },
            AppError::Internal(msg) => internal("Internal error", msg),
        };

        (status, message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
