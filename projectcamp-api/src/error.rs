/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers return `Result<T, ApiError>`; every failure renders the same
/// envelope:
///
/// ```json
/// {
///   "status": 404,
///   "message": "Project not found",
///   "data": null,
///   "success": false,
///   "errors": []
/// }
/// ```
///
/// Internal details never reach the client. Token failures of any kind become
/// 401 without saying which check failed.
///
/// # Example
///
/// ```
/// use projectcamp_api::error::{ApiError, ApiResult};
///
/// fn require(name: Option<&str>) -> ApiResult<&str> {
///     name.ok_or_else(|| ApiError::BadRequest("Name is required".to_string()))
/// }
///
/// assert!(require(None).is_err());
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use projectcamp_shared::{
    auth::{authorization::AuthzError, middleware::AuthError, password::PasswordError},
    error::{FieldError, ServiceError},
    store::StoreError,
};
use serde::Serialize;
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409) - e.g., duplicate email
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<FieldError>),

    /// Internal server error (500)
    InternalError(String),
}

/// Error envelope
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
    pub data: Option<()>,
    pub success: bool,
    pub errors: Vec<FieldError>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, errors) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, Vec::new()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, Vec::new()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, Vec::new()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, Vec::new()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg, Vec::new()),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Received data is not valid".to_string(),
                errors,
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong".to_string(),
                    Vec::new(),
                )
            }
        };

        let body = Json(ErrorResponse {
            status: status.as_u16(),
            message,
            data: None,
            success: false,
            errors,
        });

        (status, body).into_response()
    }
}

/// Convert service errors to API errors
impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::BadRequest(msg) => ApiError::BadRequest(msg),
            ServiceError::Unauthorized(msg) => ApiError::Unauthorized(msg),
            ServiceError::Forbidden(msg) => ApiError::Forbidden(msg),
            ServiceError::NotFound(msg) => ApiError::NotFound(msg),
            ServiceError::Conflict(msg) => ApiError::Conflict(msg),
            ServiceError::InvalidToken(msg) => ApiError::BadRequest(msg),
            ServiceError::Validation(errors) => ApiError::ValidationError(errors),
            ServiceError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

/// Convert store errors to API errors
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ServiceError::from(err).into()
    }
}

/// Convert auth errors to API errors
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => {
                ApiError::Unauthorized("Unauthorized request".to_string())
            }
            AuthError::InvalidToken(e) => {
                tracing::debug!(error = %e, "Access token rejected");
                ApiError::Unauthorized("Invalid access token".to_string())
            }
            AuthError::UnknownUser => ApiError::Unauthorized("Invalid access token".to_string()),
            AuthError::Store(e) => e.into(),
        }
    }
}

/// Convert authorization errors to API errors
impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::MissingProjectId | AuthzError::InvalidProjectId => {
                ApiError::BadRequest(err.to_string())
            }
            AuthzError::NotMember => ApiError::NotFound(err.to_string()),
            AuthzError::Forbidden { .. } => ApiError::Forbidden(err.to_string()),
            AuthzError::Store(e) => e.into(),
        }
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Convert request validation failures to API errors
impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut errors: Vec<FieldError> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    FieldError::new(
                        field.to_string(),
                        error
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| "Validation failed".to_string()),
                    )
                })
            })
            .collect();
        errors.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::ValidationError(errors)
    }
}
