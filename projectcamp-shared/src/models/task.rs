/// Task model and database operations
///
/// Tasks belong to a project and may be assigned to one of its members.
///
/// # Status
///
/// ```text
/// todo → in_progress → done
/// ```
///
/// Any transition is accepted; the status is informational.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('todo', 'in_progress', 'done');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY,
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     title VARCHAR(200) NOT NULL,
///     description TEXT,
///     assigned_to UUID REFERENCES users(id) ON DELETE SET NULL,
///     assigned_by UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     status task_status NOT NULL DEFAULT 'todo',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::subtask::SubtaskWithCreator;
use super::user::{Avatar, UserSummary};

/// Progress of a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }
}

const TASK_COLUMNS: &str =
    "id, project_id, title, description, assigned_to, assigned_by, status, created_at, updated_at";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub assigned_by: Uuid,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct NewTask {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub assigned_by: Uuid,
    pub status: TaskStatus,
}

/// Partial update of a task
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub assigned_to: Option<Option<Uuid>>,
    pub status: Option<TaskStatus>,
}

/// Task with its assignee populated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskWithAssignee {
    #[serde(flatten)]
    pub task: Task,
    pub assignee: Option<UserSummary>,
}

/// Task with assignee and subtasks populated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetails {
    #[serde(flatten)]
    pub task: Task,
    pub assignee: Option<UserSummary>,
    pub subtasks: Vec<SubtaskWithCreator>,
}

#[derive(sqlx::FromRow)]
struct TaskWithAssigneeRow {
    #[sqlx(flatten)]
    task: Task,
    assignee_username: Option<String>,
    assignee_full_name: Option<String>,
    assignee_avatar_url: Option<String>,
    assignee_avatar_local_path: Option<String>,
    assignee_email: Option<String>,
}

impl From<TaskWithAssigneeRow> for TaskWithAssignee {
    fn from(row: TaskWithAssigneeRow) -> Self {
        let assignee = match (row.task.assigned_to, row.assignee_username, row.assignee_email) {
            (Some(id), Some(username), Some(email)) => Some(UserSummary {
                id,
                username,
                full_name: row.assignee_full_name,
                avatar: Avatar {
                    url: row.assignee_avatar_url.unwrap_or_default(),
                    local_path: row.assignee_avatar_local_path.unwrap_or_default(),
                },
                email,
            }),
            _ => None,
        };

        Self {
            task: row.task,
            assignee,
        }
    }
}

impl Task {
    pub async fn create(pool: &PgPool, data: NewTask) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO tasks (id, project_id, title, description, assigned_to, assigned_by, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            TASK_COLUMNS
        );

        sqlx::query_as::<_, Task>(&query)
            .bind(Uuid::new_v4())
            .bind(data.project_id)
            .bind(data.title)
            .bind(data.description)
            .bind(data.assigned_to)
            .bind(data.assigned_by)
            .bind(data.status)
            .fetch_one(pool)
            .await
    }

    /// Finds a task only if it belongs to `project_id`
    pub async fn find_in_project(
        pool: &PgPool,
        project_id: Uuid,
        task_id: Uuid,
    ) -> Result<Option<TaskWithAssignee>, sqlx::Error> {
        let row = sqlx::query_as::<_, TaskWithAssigneeRow>(
            r#"
            SELECT t.id, t.project_id, t.title, t.description, t.assigned_to, t.assigned_by,
                   t.status, t.created_at, t.updated_at,
                   u.username AS assignee_username, u.full_name AS assignee_full_name,
                   u.avatar_url AS assignee_avatar_url,
                   u.avatar_local_path AS assignee_avatar_local_path,
                   u.email AS assignee_email
            FROM tasks t
            LEFT JOIN users u ON u.id = t.assigned_to
            WHERE t.project_id = $1 AND t.id = $2
            "#,
        )
        .bind(project_id)
        .bind(task_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(TaskWithAssignee::from))
    }

    /// Tasks of a project with assignees, newest first
    pub async fn list_for_project(
        pool: &PgPool,
        project_id: Uuid,
    ) -> Result<Vec<TaskWithAssignee>, sqlx::Error> {
        let rows = sqlx::query_as::<_, TaskWithAssigneeRow>(
            r#"
            SELECT t.id, t.project_id, t.title, t.description, t.assigned_to, t.assigned_by,
                   t.status, t.created_at, t.updated_at,
                   u.username AS assignee_username, u.full_name AS assignee_full_name,
                   u.avatar_url AS assignee_avatar_url,
                   u.avatar_local_path AS assignee_avatar_local_path,
                   u.email AS assignee_email
            FROM tasks t
            LEFT JOIN users u ON u.id = t.assigned_to
            WHERE t.project_id = $1
            ORDER BY t.created_at DESC
            "#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(TaskWithAssignee::from).collect())
    }

    pub async fn update(
        pool: &PgPool,
        project_id: Uuid,
        task_id: Uuid,
        data: TaskUpdate,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE tasks SET updated_at = NOW()");
        let mut bind_count = 2;

        if data.title.is_some() {
            bind_count += 1;
            query.push_str(&format!(", title = ${}", bind_count));
        }
        if data.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }
        if data.assigned_to.is_some() {
            bind_count += 1;
            query.push_str(&format!(", assigned_to = ${}", bind_count));
        }
        if data.status.is_some() {
            bind_count += 1;
            query.push_str(&format!(", status = ${}", bind_count));
        }

        query.push_str(&format!(
            " WHERE project_id = $1 AND id = $2 RETURNING {}",
            TASK_COLUMNS
        ));

        let mut q = sqlx::query_as::<_, Task>(&query).bind(project_id).bind(task_id);

        if let Some(title) = data.title {
            q = q.bind(title);
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }
        if let Some(assigned_to) = data.assigned_to {
            q = q.bind(assigned_to);
        }
        if let Some(status) = data.status {
            q = q.bind(status);
        }

        q.fetch_optional(pool).await
    }

    /// Deletes a task and, through the cascade, its subtasks
    pub async fn delete(
        pool: &PgPool,
        project_id: Uuid,
        task_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "DELETE FROM tasks WHERE project_id = $1 AND id = $2 RETURNING {}",
            TASK_COLUMNS
        );

        sqlx::query_as::<_, Task>(&query)
            .bind(project_id)
            .bind(task_id)
            .fetch_optional(pool)
            .await
    }
}
