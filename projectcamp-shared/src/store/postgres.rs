/// Postgres store backend
///
/// Thin adapter from the store traits onto the model-level SQL in
/// [`crate::models`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{MemberStore, ProjectStore, Store, StoreResult, TaskStore, UserStore};
use crate::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool, health_check, DatabaseConfig},
};
use crate::models::project::{NewProject, Project, ProjectListing, ProjectUpdate};
use crate::models::project_member::{MemberDetails, ProjectMember, ProjectRole};
use crate::models::subtask::{NewSubtask, Subtask, SubtaskUpdate, SubtaskWithCreator};
use crate::models::task::{NewTask, Task, TaskUpdate, TaskWithAssignee};
use crate::models::user::{NewUser, User, UserUpdate};

/// Error raised while opening the store
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Failed to connect to database: {0}")]
    Pool(#[from] sqlx::Error),

    #[error("Failed to run migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Store backed by a Postgres pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wraps an existing pool without touching the schema
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool and brings the schema up to date
    pub async fn connect(config: DatabaseConfig) -> Result<Self, ConnectError> {
        let pool = create_pool(config).await?;
        run_migrations(&pool).await?;
        info!("Postgres store ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        Ok(User::create(&self.pool, user).await?)
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn find_user_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> StoreResult<Option<User>> {
        Ok(User::find_by_username_or_email(&self.pool, username, email).await?)
    }

    async fn find_user_by_verification_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        Ok(User::find_by_verification_token(&self.pool, token_hash, now).await?)
    }

    async fn find_user_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        Ok(User::find_by_reset_token(&self.pool, token_hash, now).await?)
    }

    async fn write_user_update(&self, id: Uuid, update: UserUpdate) -> StoreResult<Option<User>> {
        Ok(User::update(&self.pool, id, update).await?)
    }
}

#[async_trait]
impl ProjectStore for PgStore {
    async fn create_project(&self, project: NewProject) -> StoreResult<Project> {
        Ok(Project::create_with_owner(&self.pool, project).await?)
    }

    async fn find_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        Ok(Project::find_by_id(&self.pool, id).await?)
    }

    async fn update_project(&self, id: Uuid, update: ProjectUpdate) -> StoreResult<Option<Project>> {
        Ok(Project::update(&self.pool, id, update).await?)
    }

    async fn delete_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        Ok(Project::delete(&self.pool, id).await?)
    }

    async fn list_projects_for_user(&self, user_id: Uuid) -> StoreResult<Vec<ProjectListing>> {
        Ok(Project::list_for_user(&self.pool, user_id).await?)
    }
}

#[async_trait]
impl MemberStore for PgStore {
    async fn find_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<ProjectMember>> {
        Ok(ProjectMember::find(&self.pool, project_id, user_id).await?)
    }

    async fn upsert_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> StoreResult<ProjectMember> {
        Ok(ProjectMember::upsert(&self.pool, project_id, user_id, role).await?)
    }

    async fn update_member_role(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> StoreResult<Option<ProjectMember>> {
        Ok(ProjectMember::update_role(&self.pool, project_id, user_id, role).await?)
    }

    async fn remove_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<ProjectMember>> {
        Ok(ProjectMember::delete(&self.pool, project_id, user_id).await?)
    }

    async fn list_members(&self, project_id: Uuid) -> StoreResult<Vec<MemberDetails>> {
        Ok(ProjectMember::list_for_project(&self.pool, project_id).await?)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn create_task(&self, task: NewTask) -> StoreResult<Task> {
        Ok(Task::create(&self.pool, task).await?)
    }

    async fn find_task(
        &self,
        project_id: Uuid,
        task_id: Uuid,
    ) -> StoreResult<Option<TaskWithAssignee>> {
        Ok(Task::find_in_project(&self.pool, project_id, task_id).await?)
    }

    async fn list_tasks(&self, project_id: Uuid) -> StoreResult<Vec<TaskWithAssignee>> {
        Ok(Task::list_for_project(&self.pool, project_id).await?)
    }

    async fn update_task(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        update: TaskUpdate,
    ) -> StoreResult<Option<Task>> {
        Ok(Task::update(&self.pool, project_id, task_id, update).await?)
    }

    async fn delete_task(&self, project_id: Uuid, task_id: Uuid) -> StoreResult<Option<Task>> {
        Ok(Task::delete(&self.pool, project_id, task_id).await?)
    }

    async fn create_subtask(&self, subtask: NewSubtask) -> StoreResult<Subtask> {
        Ok(Subtask::create(&self.pool, subtask).await?)
    }

    async fn find_subtask(&self, task_id: Uuid, subtask_id: Uuid) -> StoreResult<Option<Subtask>> {
        Ok(Subtask::find_in_task(&self.pool, task_id, subtask_id).await?)
    }

    async fn list_subtasks(&self, task_id: Uuid) -> StoreResult<Vec<SubtaskWithCreator>> {
        Ok(Subtask::list_for_task(&self.pool, task_id).await?)
    }

    async fn update_subtask(
        &self,
        task_id: Uuid,
        subtask_id: Uuid,
        update: SubtaskUpdate,
    ) -> StoreResult<Option<Subtask>> {
        Ok(Subtask::update(&self.pool, task_id, subtask_id, update).await?)
    }

    async fn delete_subtask(
        &self,
        task_id: Uuid,
        subtask_id: Uuid,
    ) -> StoreResult<Option<Subtask>> {
        Ok(Subtask::delete(&self.pool, task_id, subtask_id).await?)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(health_check(&self.pool).await?)
    }

    async fn close(&self) {
        close_pool(&self.pool).await;
    }
}
