/// Project membership model and database operations
///
/// Binds a user to a project with a role. The composite primary key makes
/// `(project_id, user_id)` unique, so adding an existing member updates the
/// role instead of creating a second row.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE project_role AS ENUM ('admin', 'project_admin', 'member', 'viewer');
///
/// CREATE TABLE project_members (
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role project_role NOT NULL DEFAULT 'member',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (project_id, user_id)
/// );
/// ```
///
/// # Roles
///
/// - **admin**: Everything, including deleting the project and managing members
/// - **project_admin**: Manages tasks and subtasks
/// - **member**: Reads everything, completes subtasks
/// - **viewer**: Read-only

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::user::{Avatar, UserSummary};

/// Role of a user within one project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProjectRole {
    Admin,
    ProjectAdmin,
    Member,
    Viewer,
}

impl ProjectRole {
    /// Every role, for routes open to any member
    pub const ALL: &'static [ProjectRole] = &[
        ProjectRole::Admin,
        ProjectRole::ProjectAdmin,
        ProjectRole::Member,
        ProjectRole::Viewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectRole::Admin => "admin",
            ProjectRole::ProjectAdmin => "project_admin",
            ProjectRole::Member => "member",
            ProjectRole::Viewer => "viewer",
        }
    }
}

impl fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no role
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for ProjectRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProjectRole::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == s.trim())
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Membership row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMember {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role: ProjectRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Member listing entry with the user populated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDetails {
    pub user: UserSummary,
    pub role: ProjectRole,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct MemberDetailsRow {
    user_id: Uuid,
    username: String,
    full_name: Option<String>,
    avatar_url: String,
    avatar_local_path: String,
    email: String,
    role: ProjectRole,
    created_at: DateTime<Utc>,
}

impl From<MemberDetailsRow> for MemberDetails {
    fn from(row: MemberDetailsRow) -> Self {
        Self {
            user: UserSummary {
                id: row.user_id,
                username: row.username,
                full_name: row.full_name,
                avatar: Avatar {
                    url: row.avatar_url,
                    local_path: row.avatar_local_path,
                },
                email: row.email,
            },
            role: row.role,
            created_at: row.created_at,
        }
    }
}

impl ProjectMember {
    pub async fn find(
        pool: &PgPool,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ProjectMember>(
            r#"
            SELECT project_id, user_id, role, created_at, updated_at
            FROM project_members
            WHERE project_id = $1 AND user_id = $2
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Adds a member, or updates the role of an existing one
    pub async fn upsert(
        pool: &PgPool,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ProjectMember>(
            r#"
            INSERT INTO project_members (project_id, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (project_id, user_id)
            DO UPDATE SET role = EXCLUDED.role, updated_at = NOW()
            RETURNING project_id, user_id, role, created_at, updated_at
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(pool)
        .await
    }

    /// Changes the role of an existing member; `None` if not a member
    pub async fn update_role(
        pool: &PgPool,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ProjectMember>(
            r#"
            UPDATE project_members
            SET role = $3, updated_at = NOW()
            WHERE project_id = $1 AND user_id = $2
            RETURNING project_id, user_id, role, created_at, updated_at
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(pool)
        .await
    }

    /// Removes a member; returns the removed row
    pub async fn delete(
        pool: &PgPool,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ProjectMember>(
            r#"
            DELETE FROM project_members
            WHERE project_id = $1 AND user_id = $2
            RETURNING project_id, user_id, role, created_at, updated_at
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Lists the members of a project, oldest first
    pub async fn list_for_project(
        pool: &PgPool,
        project_id: Uuid,
    ) -> Result<Vec<MemberDetails>, sqlx::Error> {
        let rows = sqlx::query_as::<_, MemberDetailsRow>(
            r#"
            SELECT u.id AS user_id, u.username, u.full_name, u.avatar_url,
                   u.avatar_local_path, u.email, m.role, m.created_at
            FROM project_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.project_id = $1
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(MemberDetails::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<ProjectRole>().unwrap(), ProjectRole::Admin);
        assert_eq!(
            "project_admin".parse::<ProjectRole>().unwrap(),
            ProjectRole::ProjectAdmin
        );
        assert_eq!(" viewer ".parse::<ProjectRole>().unwrap(), ProjectRole::Viewer);
        assert_eq!(
            "owner".parse::<ProjectRole>().unwrap_err(),
            UnknownRole("owner".into())
        );
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(
            serde_json::to_value(ProjectRole::ProjectAdmin).unwrap(),
            "project_admin"
        );
        let role: ProjectRole = serde_json::from_str("\"member\"").unwrap();
        assert_eq!(role, ProjectRole::Member);
    }

    #[test]
    fn test_all_roles_roundtrip_through_display() {
        for role in ProjectRole::ALL {
            assert_eq!(role.to_string().parse::<ProjectRole>().unwrap(), *role);
        }
    }
}
