use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::ApiResponse;

/// Every failure the directory core can surface to a caller.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Invalid vote value: {0} (expected -1 or 1)")]
    InvalidVoteValue(i64),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

impl DirectoryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DirectoryError::InvalidVoteValue(_) | DirectoryError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            DirectoryError::NotFound(_) => StatusCode::NOT_FOUND,
            DirectoryError::Forbidden(_) => StatusCode::FORBIDDEN,
            DirectoryError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DirectoryError::Conflict(_) => StatusCode::CONFLICT,
            DirectoryError::Database(_)
            | DirectoryError::Json(_)
            | DirectoryError::PasswordHash(_)
            | DirectoryError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand back to a client. Internal failures are not echoed.
    pub fn public_message(&self) -> String {
        match self.status_code() {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Map a UNIQUE constraint violation to `Conflict`, leaving other errors alone.
    pub(crate) fn from_unique_violation(e: rusqlite::Error, what: impl Into<String>) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                DirectoryError::Conflict(what.into())
            }
            other => DirectoryError::Database(other),
        }
    }
}

/// Lets extractors and handlers bail out with `?` and still produce the
/// standard JSON envelope.
impl ResponseError for DirectoryError {
    fn status_code(&self) -> StatusCode {
        DirectoryError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        if ResponseError::status_code(self) == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("{}", self);
        }
        HttpResponse::build(ResponseError::status_code(self))
            .json(ApiResponse::<()>::error(self.public_message()))
    }
}
