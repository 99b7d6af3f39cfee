/// Task and subtask endpoints
///
/// Everything is scoped to `:projectId`; a task id from another project is
/// reported as not found.
///
/// # Endpoints
///
/// - `GET    /api/v1/tasks/:projectId` - Any member
/// - `POST   /api/v1/tasks/:projectId` - Admin or project admin
/// - `GET    /api/v1/tasks/:projectId/t/:taskId` - Any member; includes subtasks
/// - `PUT    /api/v1/tasks/:projectId/t/:taskId` - Admin or project admin
/// - `DELETE /api/v1/tasks/:projectId/t/:taskId` - Admin or project admin
/// - `POST   /api/v1/tasks/:projectId/t/:taskId/subtasks` - Admin or project admin
/// - `PUT    /api/v1/tasks/:projectId/t/:taskId/subtasks/:subtaskId` - Members may only toggle completion
/// - `DELETE /api/v1/tasks/:projectId/t/:taskId/subtasks/:subtaskId` - Admin or project admin

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{not_blank, nullable, ValidatedJson},
    response::ApiResponse,
    routes::parse_id,
};
use axum::{
    extract::{Path, State},
    Extension,
};
use projectcamp_shared::{
    auth::{authorization::ProjectAccess, middleware::AuthContext},
    models::{
        project_member::ProjectRole,
        subtask::{NewSubtask, Subtask, SubtaskUpdate},
        task::{NewTask, Task, TaskDetails, TaskStatus, TaskUpdate, TaskWithAssignee},
    },
    store::Store,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[validate(
        length(min = 1, max = 200, message = "Title must be 1 to 200 characters long"),
        custom(function = "not_blank")
    )]
    pub title: String,

    pub description: Option<String>,

    pub assigned_to: Option<Uuid>,

    pub status: Option<TaskStatus>,
}

/// Partial task update; absent fields stay unchanged
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[validate(
        length(min = 1, max = 200, message = "Title must be 1 to 200 characters long"),
        custom(function = "not_blank")
    )]
    pub title: Option<String>,

    /// `null` clears the description
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,

    /// `null` unassigns the task
    #[serde(default, deserialize_with = "nullable")]
    pub assigned_to: Option<Option<Uuid>>,

    pub status: Option<TaskStatus>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubtaskRequest {
    #[validate(
        length(min = 1, max = 200, message = "Title must be 1 to 200 characters long"),
        custom(function = "not_blank")
    )]
    pub title: String,

    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubtaskRequest {
    #[validate(
        length(min = 1, max = 200, message = "Title must be 1 to 200 characters long"),
        custom(function = "not_blank")
    )]
    pub title: Option<String>,

    pub is_completed: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPath {
    pub task_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskPath {
    pub task_id: String,
    pub subtask_id: String,
}

fn task_not_found() -> ApiError {
    ApiError::NotFound("Task not found".to_string())
}

fn subtask_not_found() -> ApiError {
    ApiError::NotFound("Subtask not found".to_string())
}

/// Rejects assignees who are not members of the project
async fn ensure_assignable(
    store: &dyn Store,
    project_id: Uuid,
    assignee: Option<Uuid>,
) -> ApiResult<()> {
    let Some(user_id) = assignee else {
        return Ok(());
    };

    match store.find_member(project_id, user_id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::BadRequest(
            "Assignee must be a member of the project".to_string(),
        )),
    }
}

/// Confirms the task belongs to the project
async fn ensure_task(store: &dyn Store, project_id: Uuid, task_id: Uuid) -> ApiResult<()> {
    store
        .find_task(project_id, task_id)
        .await?
        .map(|_| ())
        .ok_or_else(task_not_found)
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
) -> ApiResult<ApiResponse<Vec<TaskWithAssignee>>> {
    let tasks = state.store.list_tasks(access.project_id).await?;

    Ok(ApiResponse::ok(tasks, "Tasks fetched successfully"))
}

/// Creates a task assigned by the caller
///
/// # Errors
///
/// - `400 Bad Request`: Assignee is not a project member
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(access): Extension<ProjectAccess>,
    ValidatedJson(req): ValidatedJson<CreateTaskRequest>,
) -> ApiResult<ApiResponse<Task>> {
    ensure_assignable(&*state.store, access.project_id, req.assigned_to).await?;

    let task = state
        .store
        .create_task(NewTask {
            project_id: access.project_id,
            title: req.title.trim().to_string(),
            description: req.description,
            assigned_to: req.assigned_to,
            assigned_by: auth.user_id(),
            status: req.status.unwrap_or_default(),
        })
        .await?;

    info!(project_id = %access.project_id, task_id = %task.id, "Task created");
    Ok(ApiResponse::created(task, "Task created successfully"))
}

/// Task with its assignee and subtasks
pub async fn get_task(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Path(path): Path<TaskPath>,
) -> ApiResult<ApiResponse<TaskDetails>> {
    let task_id = parse_id(&path.task_id, "task")?;

    let details = state
        .store
        .task_details(access.project_id, task_id)
        .await?
        .ok_or_else(task_not_found)?;

    Ok(ApiResponse::ok(details, "Task fetched successfully"))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Path(path): Path<TaskPath>,
    ValidatedJson(req): ValidatedJson<UpdateTaskRequest>,
) -> ApiResult<ApiResponse<Task>> {
    let task_id = parse_id(&path.task_id, "task")?;
    ensure_assignable(&*state.store, access.project_id, req.assigned_to.flatten()).await?;

    let update = TaskUpdate {
        title: req.title.map(|title| title.trim().to_string()),
        description: req.description,
        assigned_to: req.assigned_to,
        status: req.status,
    };

    let task = state
        .store
        .update_task(access.project_id, task_id, update)
        .await?
        .ok_or_else(task_not_found)?;

    info!(project_id = %access.project_id, task_id = %task.id, status = %task.status.as_str(), "Task updated");
    Ok(ApiResponse::ok(task, "Task updated successfully"))
}

/// Deletes the task and its subtasks
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Path(path): Path<TaskPath>,
) -> ApiResult<ApiResponse<Task>> {
    let task_id = parse_id(&path.task_id, "task")?;

    let task = state
        .store
        .delete_task(access.project_id, task_id)
        .await?
        .ok_or_else(task_not_found)?;

    info!(project_id = %access.project_id, task_id = %task.id, "Task deleted");
    Ok(ApiResponse::ok(task, "Task deleted successfully"))
}

pub async fn create_subtask(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(access): Extension<ProjectAccess>,
    Path(path): Path<TaskPath>,
    ValidatedJson(req): ValidatedJson<CreateSubtaskRequest>,
) -> ApiResult<ApiResponse<Subtask>> {
    let task_id = parse_id(&path.task_id, "task")?;
    ensure_task(&*state.store, access.project_id, task_id).await?;
    ensure_assignable(&*state.store, access.project_id, req.assigned_to).await?;

    let subtask = state
        .store
        .create_subtask(NewSubtask {
            task_id,
            title: req.title.trim().to_string(),
            assigned_to: req.assigned_to,
            created_by: auth.user_id(),
        })
        .await?;

    info!(task_id = %task_id, subtask_id = %subtask.id, "Subtask created");
    Ok(ApiResponse::created(subtask, "Subtask created successfully"))
}

/// Updates a subtask
///
/// # Errors
///
/// - `403 Forbidden`: A `member` tried to change the title
pub async fn update_subtask(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Path(path): Path<SubtaskPath>,
    ValidatedJson(req): ValidatedJson<UpdateSubtaskRequest>,
) -> ApiResult<ApiResponse<Subtask>> {
    let task_id = parse_id(&path.task_id, "task")?;
    let subtask_id = parse_id(&path.subtask_id, "subtask")?;

    if access.role == ProjectRole::Member && req.title.is_some() {
        return Err(ApiError::Forbidden(
            "Members can only update subtask completion".to_string(),
        ));
    }

    ensure_task(&*state.store, access.project_id, task_id).await?;

    let update = SubtaskUpdate {
        title: req.title.map(|title| title.trim().to_string()),
        is_completed: req.is_completed,
    };

    let subtask = state
        .store
        .update_subtask(task_id, subtask_id, update)
        .await?
        .ok_or_else(subtask_not_found)?;

    info!(task_id = %task_id, subtask_id = %subtask.id, completed = subtask.is_completed, "Subtask updated");
    Ok(ApiResponse::ok(subtask, "Subtask updated successfully"))
}

pub async fn delete_subtask(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Path(path): Path<SubtaskPath>,
) -> ApiResult<ApiResponse<Subtask>> {
    let task_id = parse_id(&path.task_id, "task")?;
    let subtask_id = parse_id(&path.subtask_id, "subtask")?;
    ensure_task(&*state.store, access.project_id, task_id).await?;

    let subtask = state
        .store
        .delete_subtask(task_id, subtask_id)
        .await?
        .ok_or_else(subtask_not_found)?;

    info!(task_id = %task_id, subtask_id = %subtask.id, "Subtask deleted");
    Ok(ApiResponse::ok(subtask, "Subtask deleted successfully"))
}
