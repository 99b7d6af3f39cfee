//! # ProjectCamp API Server Library
//!
//! This library provides the HTTP surface of ProjectCamp: accounts, projects,
//! members, tasks and subtasks.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Validated JSON bodies
//! - `mailer`: HTTP mail relay transport
//! - `middleware`: Access control and security headers
//! - `response`: Success envelope
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod mailer;
pub mod middleware;
pub mod response;
pub mod routes;
