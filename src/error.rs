use thiserror::Error;

use crate::auth::PasswordError;
use crate::object_store::ObjectStoreError;
use crate::storage::DatabaseError;

/// Outcome of a domain operation that did not succeed.
///
/// Everything except `Internal` is an expected result the caller is meant to
/// match on. `Internal` carries the underlying defect for logging only; it is
/// never shown to clients.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("File exceeds maximum upload size of {0} bytes")]
    PayloadTooLarge(u64),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized(message.into())
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        AppError::PermissionDenied(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal(message.into())
    }
}

impl From<DatabaseError> for AppError {
    fn from(e: DatabaseError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<ObjectStoreError> for AppError {
    fn from(e: ObjectStoreError) -> Self {
        match e {
            ObjectStoreError::NotFound(_) => AppError::not_found("File content not found"),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::TooShort | PasswordError::TooLong => AppError::Validation(e.to_string()),
            PasswordError::VerificationFailed => AppError::unauthorized("Incorrect password"),
            PasswordError::HashError(_) | PasswordError::InvalidHash => {
                AppError::Internal(e.to_string())
            }
        }
    }
}
