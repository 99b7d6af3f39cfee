/// Storage traits and backends
///
/// Handlers and the auth flow talk to storage only through these traits, held as
/// an explicitly constructed [`DynStore`] handle. Two backends implement them:
///
/// - [`postgres::PgStore`]: the production backend over a sqlx pool
/// - [`memory::MemoryStore`]: an in-process backend with the same uniqueness
///   rules, used by tests and local demos
///
/// # Example
///
/// ```
/// use projectcamp_shared::models::user::NewUser;
/// use projectcamp_shared::store::{memory::MemoryStore, UserStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// let user = store.create_user(NewUser::new("alice", "a@x.com", None, "pw123")?).await?;
/// let found = store.find_user_by_username_or_email(None, Some("A@X.com")).await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::FieldError;
use crate::models::project::{NewProject, Project, ProjectListing, ProjectUpdate};
use crate::models::project_member::{MemberDetails, ProjectMember, ProjectRole};
use crate::models::subtask::{NewSubtask, Subtask, SubtaskUpdate, SubtaskWithCreator};
use crate::models::task::{NewTask, Task, TaskDetails, TaskUpdate, TaskWithAssignee};
use crate::models::user::{NewUser, SaveMode, User, UserUpdate};

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness rule rejected the write
    #[error("{0}")]
    Conflict(String),

    /// Field checks failed under [`SaveMode::Validated`]
    #[error("Validation failed: {} errors", .0.len())]
    Validation(Vec<FieldError>),

    /// Backend failure
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                let message = match db_err.constraint() {
                    Some("users_username_key") => "Username already exists",
                    Some("users_email_key") => "Email already exists",
                    _ => "Record already exists",
                };
                return StoreError::Conflict(message.to_string());
            }
        }

        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Credential store
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user; `Conflict` if the username or email is taken
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Matches either identifier; `None` identifiers never match
    async fn find_user_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> StoreResult<Option<User>>;

    /// Matches only while the verification token expiry is after `now`
    async fn find_user_by_verification_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>>;

    /// Matches only while the forgot-password token expiry is after `now`
    async fn find_user_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>>;

    /// Writes a partial update without checks
    async fn write_user_update(&self, id: Uuid, update: UserUpdate) -> StoreResult<Option<User>>;

    /// Partial update; `SaveMode::Validated` runs the field checks first
    async fn update_user(
        &self,
        id: Uuid,
        update: UserUpdate,
        mode: SaveMode,
    ) -> StoreResult<Option<User>> {
        if mode == SaveMode::Validated {
            update.validate().map_err(StoreError::Validation)?;
        }
        self.write_user_update(id, update).await
    }
}

/// Project persistence
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Creates the project and its creator's admin membership together
    async fn create_project(&self, project: NewProject) -> StoreResult<Project>;

    async fn find_project(&self, id: Uuid) -> StoreResult<Option<Project>>;

    async fn update_project(&self, id: Uuid, update: ProjectUpdate) -> StoreResult<Option<Project>>;

    /// Deletes the project with its members, tasks and subtasks
    async fn delete_project(&self, id: Uuid) -> StoreResult<Option<Project>>;

    async fn list_projects_for_user(&self, user_id: Uuid) -> StoreResult<Vec<ProjectListing>>;
}

/// Project membership persistence
#[async_trait]
pub trait MemberStore: Send + Sync {
    async fn find_member(&self, project_id: Uuid, user_id: Uuid)
        -> StoreResult<Option<ProjectMember>>;

    /// Inserts or updates the single row for `(project_id, user_id)`
    async fn upsert_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> StoreResult<ProjectMember>;

    async fn update_member_role(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> StoreResult<Option<ProjectMember>>;

    async fn remove_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<ProjectMember>>;

    async fn list_members(&self, project_id: Uuid) -> StoreResult<Vec<MemberDetails>>;
}

/// Task and subtask persistence
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, task: NewTask) -> StoreResult<Task>;

    async fn find_task(&self, project_id: Uuid, task_id: Uuid)
        -> StoreResult<Option<TaskWithAssignee>>;

    async fn list_tasks(&self, project_id: Uuid) -> StoreResult<Vec<TaskWithAssignee>>;

    async fn update_task(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        update: TaskUpdate,
    ) -> StoreResult<Option<Task>>;

    /// Deletes the task and its subtasks
    async fn delete_task(&self, project_id: Uuid, task_id: Uuid) -> StoreResult<Option<Task>>;

    async fn create_subtask(&self, subtask: NewSubtask) -> StoreResult<Subtask>;

    async fn find_subtask(&self, task_id: Uuid, subtask_id: Uuid)
        -> StoreResult<Option<Subtask>>;

    async fn list_subtasks(&self, task_id: Uuid) -> StoreResult<Vec<SubtaskWithCreator>>;

    async fn update_subtask(
        &self,
        task_id: Uuid,
        subtask_id: Uuid,
        update: SubtaskUpdate,
    ) -> StoreResult<Option<Subtask>>;

    async fn delete_subtask(&self, task_id: Uuid, subtask_id: Uuid)
        -> StoreResult<Option<Subtask>>;

    /// Task with assignee and subtasks
    async fn task_details(
        &self,
        project_id: Uuid,
        task_id: Uuid,
    ) -> StoreResult<Option<TaskDetails>> {
        let Some(found) = self.find_task(project_id, task_id).await? else {
            return Ok(None);
        };
        let subtasks = self.list_subtasks(task_id).await?;

        Ok(Some(TaskDetails {
            task: found.task,
            assignee: found.assignee,
            subtasks,
        }))
    }
}

/// Everything the application persists
#[async_trait]
pub trait Store: UserStore + ProjectStore + MemberStore + TaskStore {
    /// Cheap liveness check
    async fn ping(&self) -> StoreResult<()>;

    /// Releases backend resources; the handle is unusable afterwards
    async fn close(&self);
}

/// Shared store handle passed through the application
pub type DynStore = Arc<dyn Store>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_sqlx_error_is_not_conflict() {
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, StoreError::Database(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn test_validation_display() {
        let err = StoreError::Validation(vec![FieldError::new("fullName", "too long")]);
        assert_eq!(err.to_string(), "Validation failed: 1 errors");
    }
}
