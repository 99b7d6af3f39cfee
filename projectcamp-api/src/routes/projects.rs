/// Project endpoints
///
/// - `GET    /api/v1/projects` - Caller's projects with role and member count
/// - `POST   /api/v1/projects` - Create; the caller becomes `admin`
/// - `GET    /api/v1/projects/:projectId` - Any member
/// - `PUT    /api/v1/projects/:projectId` - Admin only
/// - `DELETE /api/v1/projects/:projectId` - Admin only; removes members, tasks and subtasks

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{not_blank, nullable, ValidatedJson},
    response::ApiResponse,
};
use axum::{extract::State, Extension};
use projectcamp_shared::{
    auth::{authorization::ProjectAccess, middleware::AuthContext},
    models::project::{NewProject, Project, ProjectListing, ProjectUpdate},
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

/// Create project request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1 to 100 characters long"),
        custom(function = "not_blank")
    )]
    pub name: String,

    pub description: Option<String>,
}

/// Update project request; absent fields stay unchanged
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1 to 100 characters long"),
        custom(function = "not_blank")
    )]
    pub name: Option<String>,

    /// `null` clears the description
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
}

fn project_not_found() -> ApiError {
    ApiError::NotFound("Project not found".to_string())
}

/// Lists every project the caller belongs to
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<Vec<ProjectListing>>> {
    let projects = state.store.list_projects_for_user(auth.user_id()).await?;

    Ok(ApiResponse::ok(projects, "Projects fetched successfully"))
}

/// Creates a project with the caller as its admin
pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<CreateProjectRequest>,
) -> ApiResult<ApiResponse<Project>> {
    let project = state
        .store
        .create_project(NewProject {
            name: req.name.trim().to_string(),
            description: req.description,
            created_by: auth.user_id(),
        })
        .await?;

    info!(project_id = %project.id, user_id = %auth.user_id(), "Project created");
    Ok(ApiResponse::created(project, "Project created successfully"))
}

pub async fn get_project(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
) -> ApiResult<ApiResponse<Project>> {
    let project = state
        .store
        .find_project(access.project_id)
        .await?
        .ok_or_else(project_not_found)?;

    Ok(ApiResponse::ok(project, "Project fetched successfully"))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    ValidatedJson(req): ValidatedJson<UpdateProjectRequest>,
) -> ApiResult<ApiResponse<Project>> {
    let update = ProjectUpdate {
        name: req.name.map(|name| name.trim().to_string()),
        description: req.description,
    };

    let project = state
        .store
        .update_project(access.project_id, update)
        .await?
        .ok_or_else(project_not_found)?;

    info!(project_id = %project.id, "Project updated");
    Ok(ApiResponse::ok(project, "Project updated successfully"))
}

/// Deletes the project and everything in it
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
) -> ApiResult<ApiResponse<Project>> {
    let project = state
        .store
        .delete_project(access.project_id)
        .await?
        .ok_or_else(project_not_found)?;

    info!(project_id = %project.id, "Project deleted");
    Ok(ApiResponse::ok(project, "Project deleted successfully"))
}
