//! # ProjectCamp Shared Library
//!
//! Domain types, persistence and authentication logic used by the ProjectCamp
//! API server.
//!
//! ## Module Organization
//!
//! - `auth`: Password hashing, JWTs, temporary tokens, the auth flow and access control
//! - `clock`: Injectable time source
//! - `db`: Postgres pool and migrations
//! - `error`: Result kinds returned by service operations
//! - `mail`: Outbound mail abstraction and message templates
//! - `models`: Users, projects, members, tasks and subtasks
//! - `store`: Storage traits with Postgres and in-memory backends

pub mod auth;
pub mod clock;
pub mod db;
pub mod error;
pub mod mail;
pub mod models;
pub mod store;

/// Current version of the ProjectCamp shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
