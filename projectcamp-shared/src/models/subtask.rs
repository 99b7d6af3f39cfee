/// Subtask model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE subtasks (
///     id UUID PRIMARY KEY,
///     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     title VARCHAR(200) NOT NULL,
///     is_completed BOOLEAN NOT NULL DEFAULT FALSE,
///     assigned_to UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_by UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::user::{Avatar, UserSummary};

const SUBTASK_COLUMNS: &str =
    "id, task_id, title, is_completed, assigned_to, created_by, created_at, updated_at";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: Uuid,
    pub task_id: Uuid,
    pub title: String,
    pub is_completed: bool,
    pub assigned_to: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSubtask {
    pub task_id: Uuid,
    pub title: String,
    pub assigned_to: Option<Uuid>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct SubtaskUpdate {
    pub title: Option<String>,
    pub is_completed: Option<bool>,
}

/// Subtask with its creator populated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskWithCreator {
    #[serde(flatten)]
    pub subtask: Subtask,
    pub creator: Option<UserSummary>,
}

#[derive(sqlx::FromRow)]
struct SubtaskWithCreatorRow {
    #[sqlx(flatten)]
    subtask: Subtask,
    creator_username: Option<String>,
    creator_full_name: Option<String>,
    creator_avatar_url: Option<String>,
    creator_avatar_local_path: Option<String>,
    creator_email: Option<String>,
}

impl From<SubtaskWithCreatorRow> for SubtaskWithCreator {
    fn from(row: SubtaskWithCreatorRow) -> Self {
        let creator = match (row.creator_username, row.creator_email) {
            (Some(username), Some(email)) => Some(UserSummary {
                id: row.subtask.created_by,
                username,
                full_name: row.creator_full_name,
                avatar: Avatar {
                    url: row.creator_avatar_url.unwrap_or_default(),
                    local_path: row.creator_avatar_local_path.unwrap_or_default(),
                },
                email,
            }),
            _ => None,
        };

        Self {
            subtask: row.subtask,
            creator,
        }
    }
}

impl Subtask {
    pub async fn create(pool: &PgPool, data: NewSubtask) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO subtasks (id, task_id, title, assigned_to, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            SUBTASK_COLUMNS
        );

        sqlx::query_as::<_, Subtask>(&query)
            .bind(Uuid::new_v4())
            .bind(data.task_id)
            .bind(data.title)
            .bind(data.assigned_to)
            .bind(data.created_by)
            .fetch_one(pool)
            .await
    }

    pub async fn find_in_task(
        pool: &PgPool,
        task_id: Uuid,
        subtask_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM subtasks WHERE task_id = $1 AND id = $2",
            SUBTASK_COLUMNS
        );

        sqlx::query_as::<_, Subtask>(&query)
            .bind(task_id)
            .bind(subtask_id)
            .fetch_optional(pool)
            .await
    }

    /// Subtasks of a task with creators, oldest first
    pub async fn list_for_task(
        pool: &PgPool,
        task_id: Uuid,
    ) -> Result<Vec<SubtaskWithCreator>, sqlx::Error> {
        let rows = sqlx::query_as::<_, SubtaskWithCreatorRow>(
            r#"
            SELECT s.id, s.task_id, s.title, s.is_completed, s.assigned_to, s.created_by,
                   s.created_at, s.updated_at,
                   u.username AS creator_username, u.full_name AS creator_full_name,
                   u.avatar_url AS creator_avatar_url,
                   u.avatar_local_path AS creator_avatar_local_path,
                   u.email AS creator_email
            FROM subtasks s
            LEFT JOIN users u ON u.id = s.created_by
            WHERE s.task_id = $1
            ORDER BY s.created_at ASC
            "#,
        )
        .bind(task_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(SubtaskWithCreator::from).collect())
    }

    pub async fn update(
        pool: &PgPool,
        task_id: Uuid,
        subtask_id: Uuid,
        data: SubtaskUpdate,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE subtasks SET updated_at = NOW()");
        let mut bind_count = 2;

        if data.title.is_some() {
            bind_count += 1;
            query.push_str(&format!(", title = ${}", bind_count));
        }
        if data.is_completed.is_some() {
            bind_count += 1;
            query.push_str(&format!(", is_completed = ${}", bind_count));
        }

        query.push_str(&format!(
            " WHERE task_id = $1 AND id = $2 RETURNING {}",
            SUBTASK_COLUMNS
        ));

        let mut q = sqlx::query_as::<_, Subtask>(&query).bind(task_id).bind(subtask_id);

        if let Some(title) = data.title {
            q = q.bind(title);
        }
        if let Some(is_completed) = data.is_completed {
            q = q.bind(is_completed);
        }

        q.fetch_optional(pool).await
    }

    pub async fn delete(
        pool: &PgPool,
        task_id: Uuid,
        subtask_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "DELETE FROM subtasks WHERE task_id = $1 AND id = $2 RETURNING {}",
            SUBTASK_COLUMNS
        );

        sqlx::query_as::<_, Subtask>(&query)
            .bind(task_id)
            .bind(subtask_id)
            .fetch_optional(pool)
            .await
    }
}
