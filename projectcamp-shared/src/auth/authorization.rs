/// Project role checks
///
/// Every project-scoped action names the roles allowed to perform it. The check
/// looks up the caller's membership of the project in the path:
///
/// 1. **Project id**: must be present and a valid UUID
/// 2. **Membership**: the caller must be a member of the project
/// 3. **Role**: the membership role must be in the allowed set
///
/// # Example
///
/// ```
/// use projectcamp_shared::auth::authorization::{authorize_project, AuthzError};
/// use projectcamp_shared::models::project_member::ProjectRole;
/// use projectcamp_shared::store::memory::MemoryStore;
/// use uuid::Uuid;
///
/// # async fn example() {
/// let store = MemoryStore::new();
/// let result = authorize_project(&store, Uuid::new_v4(), None, ProjectRole::ALL).await;
/// assert!(matches!(result, Err(AuthzError::MissingProjectId)));
/// # }
/// ```

use uuid::Uuid;

use crate::models::project_member::ProjectRole;
use crate::store::{MemberStore, StoreError};

/// Roles allowed to manage tasks and subtasks
pub const TASK_MANAGERS: &[ProjectRole] = &[ProjectRole::Admin, ProjectRole::ProjectAdmin];

/// Roles allowed to edit a subtask; members only toggle completion
pub const SUBTASK_EDITORS: &[ProjectRole] = &[
    ProjectRole::Admin,
    ProjectRole::ProjectAdmin,
    ProjectRole::Member,
];

/// Roles allowed to change the project itself and its membership
pub const PROJECT_ADMINS: &[ProjectRole] = &[ProjectRole::Admin];

/// Resolved access to a project, added to request extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectAccess {
    pub project_id: Uuid,
    pub role: ProjectRole,
}

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// The route carried no project id
    #[error("Project id is missing")]
    MissingProjectId,

    /// The project id is not a UUID
    #[error("Invalid project id")]
    InvalidProjectId,

    /// The caller has no membership in the project
    #[error("Project not found")]
    NotMember,

    /// The caller's role is outside the allowed set
    #[error("You do not have permission to perform this action")]
    Forbidden { role: ProjectRole },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Checks that `user_id` holds one of `allowed` in the project
///
/// `project_id` is the raw path segment, if the route has one.
pub async fn authorize_project<S>(
    store: &S,
    user_id: Uuid,
    project_id: Option<&str>,
    allowed: &[ProjectRole],
) -> Result<ProjectAccess, AuthzError>
where
    S: MemberStore + ?Sized,
{
    let raw = project_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(AuthzError::MissingProjectId)?;
    let project_id = Uuid::parse_str(raw).map_err(|_| AuthzError::InvalidProjectId)?;

    let member = store
        .find_member(project_id, user_id)
        .await?
        .ok_or(AuthzError::NotMember)?;

    if !allowed.contains(&member.role) {
        return Err(AuthzError::Forbidden { role: member.role });
    }

    Ok(ProjectAccess {
        project_id,
        role: member.role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::NewProject;
    use crate::models::user::NewUser;
    use crate::store::memory::MemoryStore;
    use crate::store::{ProjectStore, UserStore};

    async fn setup() -> (MemoryStore, Uuid, Uuid, Uuid) {
        let store = MemoryStore::new();
        let admin = store
            .create_user(NewUser::new("alice", "a@x.com", None, "pw123").unwrap())
            .await
            .unwrap();
        let member = store
            .create_user(NewUser::new("bob", "b@x.com", None, "pw123").unwrap())
            .await
            .unwrap();
        let project = store
            .create_project(NewProject {
                name: "Launch".into(),
                description: None,
                created_by: admin.id,
            })
            .await
            .unwrap();
        store
            .upsert_member(project.id, member.id, ProjectRole::Member)
            .await
            .unwrap();

        (store, project.id, admin.id, member.id)
    }

    #[tokio::test]
    async fn test_admin_only_rejects_member() {
        let (store, project_id, admin, member) = setup().await;
        let id = project_id.to_string();

        let denied = authorize_project(&store, member, Some(&id), PROJECT_ADMINS).await;
        assert!(matches!(
            denied,
            Err(AuthzError::Forbidden {
                role: ProjectRole::Member
            })
        ));

        let granted = authorize_project(&store, admin, Some(&id), PROJECT_ADMINS)
            .await
            .unwrap();
        assert_eq!(granted.project_id, project_id);
        assert_eq!(granted.role, ProjectRole::Admin);
    }

    #[tokio::test]
    async fn test_any_role_reads() {
        let (store, project_id, _, member) = setup().await;
        let access = authorize_project(&store, member, Some(&project_id.to_string()), ProjectRole::ALL)
            .await
            .unwrap();
        assert_eq!(access.role, ProjectRole::Member);
    }

    #[tokio::test]
    async fn test_missing_and_malformed_ids() {
        let (store, _, admin, _) = setup().await;

        assert!(matches!(
            authorize_project(&store, admin, None, ProjectRole::ALL).await,
            Err(AuthzError::MissingProjectId)
        ));
        assert!(matches!(
            authorize_project(&store, admin, Some(" "), ProjectRole::ALL).await,
            Err(AuthzError::MissingProjectId)
        ));
        assert!(matches!(
            authorize_project(&store, admin, Some("not-a-uuid"), ProjectRole::ALL).await,
            Err(AuthzError::InvalidProjectId)
        ));
    }

    #[tokio::test]
    async fn test_non_member_not_found() {
        let (store, project_id, _, _) = setup().await;
        let stranger = Uuid::new_v4();

        let result =
            authorize_project(&store, stranger, Some(&project_id.to_string()), ProjectRole::ALL).await;
        assert!(matches!(result, Err(AuthzError::NotMember)));
    }
}
