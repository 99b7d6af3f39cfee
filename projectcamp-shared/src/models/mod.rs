/// Database models for ProjectCamp
///
/// Each model owns its SQL; the [`crate::store`] backends call into these.
///
/// # Models
///
/// - `user`: Accounts, credentials and token slots
/// - `project`: Projects
/// - `project_member`: User-project relationships with roles
/// - `task`: Tasks within a project
/// - `subtask`: Checklist items within a task

pub mod project;
pub mod project_member;
pub mod subtask;
pub mod task;
pub mod user;
