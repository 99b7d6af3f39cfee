/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Account lifecycle endpoints
/// - `projects`: Project CRUD
/// - `members`: Project membership management
/// - `tasks`: Tasks and their subtasks

pub mod auth;
pub mod health;
pub mod members;
pub mod projects;
pub mod tasks;

use crate::error::{ApiError, ApiResult};
use uuid::Uuid;

/// Parses a path segment as an id, naming the resource on failure
pub(crate) fn parse_id(raw: &str, resource: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::BadRequest(format!("Invalid {} id", resource)))
}
