/// Error types for social-graph-service
///
/// Every core operation returns a typed `AppError`; handlers turn it into an
/// HTTP response through `ResponseError`.
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::repository::StoreError;
use crate::services::privacy::DenialReason;

/// Result type for service operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already following this account")]
    AlreadyFollowing,

    #[error("Not following this account")]
    NotFollowing,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Cannot follow or unfollow yourself")]
    SelfFollow,

    #[error("Invalid story type: {0}")]
    InvalidType(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(DenialReason),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Optimistic commit lost a race with a concurrent writer. Retried
    /// internally and never returned to callers of the graph operations.
    #[error("Stale write: {0}")]
    StaleWrite(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidInput,
    Forbidden,
    Unauthorized,
    Internal,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::AlreadyFollowing
            | AppError::NotFollowing
            | AppError::Conflict(_)
            | AppError::StaleWrite(_) => ErrorKind::Conflict,
            AppError::SelfFollow | AppError::InvalidType(_) | AppError::Validation(_) => {
                ErrorKind::InvalidInput
            }
            AppError::Forbidden(_) => ErrorKind::Forbidden,
            AppError::Unauthorized(_) => ErrorKind::Unauthorized,
            AppError::Database(_) | AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::AlreadyFollowing => "ALREADY_FOLLOWING",
            AppError::NotFollowing => "NOT_FOLLOWING",
            AppError::Conflict(_) | AppError::StaleWrite(_) => "CONFLICT",
            AppError::SelfFollow => "SELF_FOLLOW",
            AppError::InvalidType(_) => "INVALID_TYPE",
            AppError::Validation(_) => "INVALID_INPUT",
            AppError::Forbidden(reason) => reason.code(),
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Database(_) | AppError::Internal(_) => "INTERNAL",
        }
    }

    pub fn is_stale_write(&self) -> bool {
        matches!(self, AppError::StaleWrite(_))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        HttpResponse::build(status).json(serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
            "status": status.as_u16(),
        }))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(what) => {
                AppError::Conflict(format!("{} already exists", what))
            }
            StoreError::MissingReference(what) => AppError::NotFound(what),
            StoreError::Contention(msg) => AppError::StaleWrite(msg),
            StoreError::Database(e) => AppError::Database(e.to_string()),
            StoreError::Corrupt(msg) => AppError::Internal(msg),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}
