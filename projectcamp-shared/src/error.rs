/// Error kinds returned by service-level operations
///
/// Every fallible operation in the auth flow resolves to one of these kinds.
/// The HTTP layer maps each kind onto a status code; nothing here knows about HTTP.

use serde::{Deserialize, Serialize};

use crate::auth::password::PasswordError;
use crate::store::StoreError;

/// Single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Tagged failure of a service operation
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Missing or malformed input
    #[error("{0}")]
    BadRequest(String),

    /// Missing, invalid or expired credential
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("{0}")]
    Forbidden(String),

    /// No matching entity
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation
    #[error("{0}")]
    Conflict(String),

    /// Verification or reset token unmatched or expired
    #[error("{0}")]
    InvalidToken(String),

    /// Field-level validation failure
    #[error("Validation failed: {} errors", .0.len())]
    Validation(Vec<FieldError>),

    /// Unexpected persistence or crypto failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            StoreError::Validation(errors) => ServiceError::Validation(errors),
            StoreError::Database(e) => ServiceError::Internal(format!("Database error: {}", e)),
        }
    }
}

impl From<PasswordError> for ServiceError {
    fn from(err: PasswordError) -> Self {
        ServiceError::Internal(format!("Password operation failed: {}", err))
    }
}
