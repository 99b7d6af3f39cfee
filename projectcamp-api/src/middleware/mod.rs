/// Middleware modules for the API server
///
/// This module contains custom middleware for:
/// - Authentication and project role checks
/// - Security headers

pub mod auth;
pub mod security;
