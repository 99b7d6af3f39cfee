/// Project member endpoints
///
/// Listing is open to every member; changes are admin only.
///
/// - `GET    /api/v1/projects/:projectId/members`
/// - `POST   /api/v1/projects/:projectId/members` - `{ "email", "role" }`
/// - `PUT    /api/v1/projects/:projectId/members/:userId` - `{ "newRole" }`
/// - `DELETE /api/v1/projects/:projectId/members/:userId`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ValidatedJson,
    response::ApiResponse,
    routes::parse_id,
};
use axum::{
    extract::{Path, State},
    Extension,
};
use projectcamp_shared::{
    auth::authorization::ProjectAccess,
    models::project_member::{MemberDetails, ProjectMember, ProjectRole},
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[validate(email(message = "Email is invalid"))]
    pub email: String,

    pub role: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemberRoleRequest {
    pub new_role: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPath {
    pub user_id: String,
}

fn parse_role(raw: &str) -> ApiResult<ProjectRole> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("Invalid role".to_string()))
}

fn member_not_found() -> ApiError {
    ApiError::NotFound("Project member not found".to_string())
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
) -> ApiResult<ApiResponse<Vec<MemberDetails>>> {
    let members = state.store.list_members(access.project_id).await?;

    Ok(ApiResponse::ok(members, "Project members fetched successfully"))
}

/// Adds a user by email, or changes their role if already a member
///
/// # Errors
///
/// - `400 Bad Request`: Unknown role
/// - `404 Not Found`: No account with that email
pub async fn add_member(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    ValidatedJson(req): ValidatedJson<AddMemberRequest>,
) -> ApiResult<ApiResponse<ProjectMember>> {
    let role = parse_role(&req.role)?;

    let user = state
        .store
        .find_user_by_email(&req.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User does not exist".to_string()))?;

    let member = state
        .store
        .upsert_member(access.project_id, user.id, role)
        .await?;

    info!(project_id = %access.project_id, user_id = %user.id, role = %role, "Project member added");
    Ok(ApiResponse::created(member, "Project member added successfully"))
}

/// Changes a member's role
///
/// # Errors
///
/// - `400 Bad Request`: Unknown role
/// - `404 Not Found`: Not a member of this project
pub async fn update_member_role(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Path(path): Path<MemberPath>,
    ValidatedJson(req): ValidatedJson<UpdateMemberRoleRequest>,
) -> ApiResult<ApiResponse<ProjectMember>> {
    let user_id = parse_id(&path.user_id, "user")?;
    let role = parse_role(&req.new_role)?;

    let member = state
        .store
        .update_member_role(access.project_id, user_id, role)
        .await?
        .ok_or_else(member_not_found)?;

    info!(project_id = %access.project_id, user_id = %user_id, role = %role, "Project member role updated");
    Ok(ApiResponse::ok(member, "Project member role updated successfully"))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Path(path): Path<MemberPath>,
) -> ApiResult<ApiResponse<ProjectMember>> {
    let user_id = parse_id(&path.user_id, "user")?;

    let member = state
        .store
        .remove_member(access.project_id, user_id)
        .await?
        .ok_or_else(member_not_found)?;

    info!(project_id = %access.project_id, user_id = %user_id, "Project member removed");
    Ok(ApiResponse::ok(member, "Project member removed successfully"))
}
