/// Success envelope
///
/// Every successful response body has the shape
///
/// ```json
/// { "status": 200, "message": "...", "data": { }, "success": true }
/// ```
///
/// Error bodies use the same fields; see [`crate::error::ApiError`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// JSON success envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    #[serde(serialize_with = "serialize_status")]
    pub status: StatusCode,
    pub message: String,
    pub data: T,
    pub success: bool,
}

fn serialize_status<S: serde::Serializer>(status: &StatusCode, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u16(status.as_u16())
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data,
            success: status.as_u16() < 400,
        }
    }

    /// 200 with `data`
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, data, message)
    }

    /// 201 with `data`
    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CREATED, data, message)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
