/// In-memory store backend
///
/// Holds everything behind one `tokio::sync::RwLock`. Enforces the same rules as
/// the Postgres schema: unique usernames and emails, one membership per
/// `(project, user)`, and cascading deletes from projects and tasks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{MemberStore, ProjectStore, Store, StoreError, StoreResult, TaskStore, UserStore};
use crate::clock::{Clock, SystemClock};
use crate::models::project::{NewProject, Project, ProjectListing, ProjectUpdate};
use crate::models::project_member::{MemberDetails, ProjectMember, ProjectRole};
use crate::models::subtask::{NewSubtask, Subtask, SubtaskUpdate, SubtaskWithCreator};
use crate::models::task::{NewTask, Task, TaskUpdate, TaskWithAssignee};
use crate::models::user::{
    normalize_identifier, NewUser, User, UserSummary, UserUpdate, DEFAULT_AVATAR_URL,
};

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    // Vecs keep insertion order for stable listings
    projects: Vec<Project>,
    members: Vec<ProjectMember>,
    tasks: Vec<Task>,
    subtasks: Vec<Subtask>,
}

impl MemoryState {
    fn summary(&self, user_id: Uuid) -> Option<UserSummary> {
        self.users.get(&user_id).map(User::to_summary)
    }

    fn with_assignee(&self, task: &Task) -> TaskWithAssignee {
        TaskWithAssignee {
            task: task.clone(),
            assignee: task.assigned_to.and_then(|id| self.summary(id)),
        }
    }
}

/// Store kept entirely in process memory
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Uses `clock` for created/updated timestamps
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            clock,
        }
    }

    /// Number of stored users
    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut state = self.state.write().await;

        if state.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict("Username already exists".to_string()));
        }
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("Email already exists".to_string()));
        }

        let now = self.clock.now();
        let record = User {
            id: Uuid::new_v4(),
            password_hash: user.password_hash().to_string(),
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            is_email_verified: false,
            avatar_url: DEFAULT_AVATAR_URL.to_string(),
            avatar_local_path: String::new(),
            refresh_token: None,
            forgot_password_token: None,
            forgot_password_expiry: None,
            email_verification_token: None,
            email_verification_expiry: None,
            created_at: now,
            updated_at: now,
        };

        state.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = normalize_identifier(email);
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> StoreResult<Option<User>> {
        let username = username.map(normalize_identifier);
        let email = email.map(normalize_identifier);
        let state = self.state.read().await;

        Ok(state
            .users
            .values()
            .filter(|u| {
                username.as_deref() == Some(u.username.as_str())
                    || email.as_deref() == Some(u.email.as_str())
            })
            .min_by_key(|u| u.created_at)
            .cloned())
    }

    async fn find_user_by_verification_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| {
                u.email_verification()
                    .is_some_and(|t| t.hash == token_hash && t.is_valid_at(now))
            })
            .cloned())
    }

    async fn find_user_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| {
                u.password_reset()
                    .is_some_and(|t| t.hash == token_hash && t.is_valid_at(now))
            })
            .cloned())
    }

    async fn write_user_update(&self, id: Uuid, update: UserUpdate) -> StoreResult<Option<User>> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        Ok(state.users.get_mut(&id).map(|user| {
            update.apply_to(user, now);
            user.clone()
        }))
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn create_project(&self, project: NewProject) -> StoreResult<Project> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        let record = Project {
            id: Uuid::new_v4(),
            name: project.name,
            description: project.description,
            created_by: project.created_by,
            created_at: now,
            updated_at: now,
        };

        state.members.push(ProjectMember {
            project_id: record.id,
            user_id: record.created_by,
            role: ProjectRole::Admin,
            created_at: now,
            updated_at: now,
        });
        state.projects.push(record.clone());

        Ok(record)
    }

    async fn find_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        let state = self.state.read().await;
        Ok(state.projects.iter().find(|p| p.id == id).cloned())
    }

    async fn update_project(&self, id: Uuid, update: ProjectUpdate) -> StoreResult<Option<Project>> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        Ok(state.projects.iter_mut().find(|p| p.id == id).map(|project| {
            if let Some(name) = update.name {
                project.name = name;
            }
            if let Some(description) = update.description {
                project.description = description;
            }
            project.updated_at = now;
            project.clone()
        }))
    }

    async fn delete_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        let mut state = self.state.write().await;

        let Some(index) = state.projects.iter().position(|p| p.id == id) else {
            return Ok(None);
        };
        let project = state.projects.remove(index);

        let task_ids: Vec<Uuid> = state
            .tasks
            .iter()
            .filter(|t| t.project_id == id)
            .map(|t| t.id)
            .collect();
        state.members.retain(|m| m.project_id != id);
        state.tasks.retain(|t| t.project_id != id);
        state.subtasks.retain(|s| !task_ids.contains(&s.task_id));

        Ok(Some(project))
    }

    async fn list_projects_for_user(&self, user_id: Uuid) -> StoreResult<Vec<ProjectListing>> {
        let state = self.state.read().await;

        let mut listings: Vec<ProjectListing> = state
            .members
            .iter()
            .rev()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| {
                let project = state.projects.iter().find(|p| p.id == m.project_id)?;
                let member_count = state
                    .members
                    .iter()
                    .filter(|other| other.project_id == project.id)
                    .count() as i64;

                Some(ProjectListing {
                    project: project.clone(),
                    role: m.role,
                    member_count,
                })
            })
            .collect();

        listings.sort_by(|a, b| b.project.created_at.cmp(&a.project.created_at));
        Ok(listings)
    }
}

#[async_trait]
impl MemberStore for MemoryStore {
    async fn find_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<ProjectMember>> {
        let state = self.state.read().await;
        Ok(state
            .members
            .iter()
            .find(|m| m.project_id == project_id && m.user_id == user_id)
            .cloned())
    }

    async fn upsert_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> StoreResult<ProjectMember> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        if let Some(existing) = state
            .members
            .iter_mut()
            .find(|m| m.project_id == project_id && m.user_id == user_id)
        {
            existing.role = role;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let member = ProjectMember {
            project_id,
            user_id,
            role,
            created_at: now,
            updated_at: now,
        };
        state.members.push(member.clone());
        Ok(member)
    }

    async fn update_member_role(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> StoreResult<Option<ProjectMember>> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        Ok(state
            .members
            .iter_mut()
            .find(|m| m.project_id == project_id && m.user_id == user_id)
            .map(|member| {
                member.role = role;
                member.updated_at = now;
                member.clone()
            }))
    }

    async fn remove_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<ProjectMember>> {
        let mut state = self.state.write().await;

        Ok(state
            .members
            .iter()
            .position(|m| m.project_id == project_id && m.user_id == user_id)
            .map(|index| state.members.remove(index)))
    }

    async fn list_members(&self, project_id: Uuid) -> StoreResult<Vec<MemberDetails>> {
        let state = self.state.read().await;

        Ok(state
            .members
            .iter()
            .filter(|m| m.project_id == project_id)
            .filter_map(|m| {
                Some(MemberDetails {
                    user: state.summary(m.user_id)?,
                    role: m.role,
                    created_at: m.created_at,
                })
            })
            .collect())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create_task(&self, task: NewTask) -> StoreResult<Task> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        let record = Task {
            id: Uuid::new_v4(),
            project_id: task.project_id,
            title: task.title,
            description: task.description,
            assigned_to: task.assigned_to,
            assigned_by: task.assigned_by,
            status: task.status,
            created_at: now,
            updated_at: now,
        };
        state.tasks.push(record.clone());

        Ok(record)
    }

    async fn find_task(
        &self,
        project_id: Uuid,
        task_id: Uuid,
    ) -> StoreResult<Option<TaskWithAssignee>> {
        let state = self.state.read().await;
        Ok(state
            .tasks
            .iter()
            .find(|t| t.project_id == project_id && t.id == task_id)
            .map(|t| state.with_assignee(t)))
    }

    async fn list_tasks(&self, project_id: Uuid) -> StoreResult<Vec<TaskWithAssignee>> {
        let state = self.state.read().await;
        Ok(state
            .tasks
            .iter()
            .rev()
            .filter(|t| t.project_id == project_id)
            .map(|t| state.with_assignee(t))
            .collect())
    }

    async fn update_task(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        update: TaskUpdate,
    ) -> StoreResult<Option<Task>> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        Ok(state
            .tasks
            .iter_mut()
            .find(|t| t.project_id == project_id && t.id == task_id)
            .map(|task| {
                if let Some(title) = update.title {
                    task.title = title;
                }
                if let Some(description) = update.description {
                    task.description = description;
                }
                if let Some(assigned_to) = update.assigned_to {
                    task.assigned_to = assigned_to;
                }
                if let Some(status) = update.status {
                    task.status = status;
                }
                task.updated_at = now;
                task.clone()
            }))
    }

    async fn delete_task(&self, project_id: Uuid, task_id: Uuid) -> StoreResult<Option<Task>> {
        let mut state = self.state.write().await;

        let Some(index) = state
            .tasks
            .iter()
            .position(|t| t.project_id == project_id && t.id == task_id)
        else {
            return Ok(None);
        };
        let task = state.tasks.remove(index);
        state.subtasks.retain(|s| s.task_id != task_id);

        Ok(Some(task))
    }

    async fn create_subtask(&self, subtask: NewSubtask) -> StoreResult<Subtask> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        let record = Subtask {
            id: Uuid::new_v4(),
            task_id: subtask.task_id,
            title: subtask.title,
            is_completed: false,
            assigned_to: subtask.assigned_to,
            created_by: subtask.created_by,
            created_at: now,
            updated_at: now,
        };
        state.subtasks.push(record.clone());

        Ok(record)
    }

    async fn find_subtask(&self, task_id: Uuid, subtask_id: Uuid) -> StoreResult<Option<Subtask>> {
        let state = self.state.read().await;
        Ok(state
            .subtasks
            .iter()
            .find(|s| s.task_id == task_id && s.id == subtask_id)
            .cloned())
    }

    async fn list_subtasks(&self, task_id: Uuid) -> StoreResult<Vec<SubtaskWithCreator>> {
        let state = self.state.read().await;
        Ok(state
            .subtasks
            .iter()
            .filter(|s| s.task_id == task_id)
            .map(|s| SubtaskWithCreator {
                subtask: s.clone(),
                creator: state.summary(s.created_by),
            })
            .collect())
    }

    async fn update_subtask(
        &self,
        task_id: Uuid,
        subtask_id: Uuid,
        update: SubtaskUpdate,
    ) -> StoreResult<Option<Subtask>> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        Ok(state
            .subtasks
            .iter_mut()
            .find(|s| s.task_id == task_id && s.id == subtask_id)
            .map(|subtask| {
                if let Some(title) = update.title {
                    subtask.title = title;
                }
                if let Some(is_completed) = update.is_completed {
                    subtask.is_completed = is_completed;
                }
                subtask.updated_at = now;
                subtask.clone()
            }))
    }

    async fn delete_subtask(
        &self,
        task_id: Uuid,
        subtask_id: Uuid,
    ) -> StoreResult<Option<Subtask>> {
        let mut state = self.state.write().await;

        Ok(state
            .subtasks
            .iter()
            .position(|s| s.task_id == task_id && s.id == subtask_id)
            .map(|index| state.subtasks.remove(index)))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn close(&self) {}
}
