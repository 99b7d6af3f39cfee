/// Project model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE projects (
///     id UUID PRIMARY KEY,
///     name VARCHAR(100) NOT NULL,
///     description TEXT,
///     created_by UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::project_member::ProjectRole;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a project
#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub created_by: Uuid,
}

/// Partial update of a project
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,

    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
}

/// One entry of the caller's project list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectListing {
    pub project: Project,
    pub role: ProjectRole,
    pub member_count: i64,
}

#[derive(sqlx::FromRow)]
struct ProjectListingRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    role: ProjectRole,
    member_count: i64,
}

impl From<ProjectListingRow> for ProjectListing {
    fn from(row: ProjectListingRow) -> Self {
        Self {
            project: Project {
                id: row.id,
                name: row.name,
                description: row.description,
                created_by: row.created_by,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            role: row.role,
            member_count: row.member_count,
        }
    }
}

impl Project {
    /// Creates a project and makes its creator an admin member
    ///
    /// Both rows are written in one transaction.
    pub async fn create_with_owner(pool: &PgPool, data: NewProject) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (id, name, description, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, created_by, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.name)
        .bind(data.description)
        .bind(data.created_by)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO project_members (project_id, user_id, role)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(project.id)
        .bind(project.created_by)
        .bind(ProjectRole::Admin)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(project)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT id, name, description, created_by, created_at, updated_at
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: ProjectUpdate,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE projects SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }

        query.push_str(
            " WHERE id = $1 RETURNING id, name, description, created_by, created_at, updated_at",
        );

        let mut q = sqlx::query_as::<_, Project>(&query).bind(id);

        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }

        q.fetch_optional(pool).await
    }

    /// Deletes a project; members, tasks and subtasks cascade
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            DELETE FROM projects
            WHERE id = $1
            RETURNING id, name, description, created_by, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Projects the user belongs to, with their role and the member count
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<ProjectListing>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ProjectListingRow>(
            r#"
            SELECT p.id, p.name, p.description, p.created_by, p.created_at, p.updated_at,
                   m.role,
                   (SELECT COUNT(*) FROM project_members c WHERE c.project_id = p.id) AS member_count
            FROM project_members m
            JOIN projects p ON p.id = m.project_id
            WHERE m.user_id = $1
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(ProjectListing::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_serializes_camel_case() {
        let now = Utc::now();
        let listing = ProjectListing {
            project: Project {
                id: Uuid::new_v4(),
                name: "Launch".into(),
                description: None,
                created_by: Uuid::new_v4(),
                created_at: now,
                updated_at: now,
            },
            role: ProjectRole::Admin,
            member_count: 3,
        };

        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["memberCount"], 3);
        assert_eq!(json["role"], "admin");
        assert_eq!(json["project"]["name"], "Launch");
        assert!(json["project"]["createdBy"].is_string());
    }
}
