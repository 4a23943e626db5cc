//! Core library for the lockscan CLI.
//!
//! This crate holds everything behind the command surface:
//! - `auth`: credential persistence and the browser-based OAuth login flow
//! - `api`: HTTP client for the report API (reports, sections, upload)
//! - `backoff`: bounded retry with exponential delays
//! - `rules`: expression-based report validation
//! - `config`: service endpoints and per-user paths
//!
//! The report API uses OAuth2 bearer token authentication obtained through
//! the lockscan.dev SSO service.

pub mod api;
pub mod auth;
pub mod backoff;
pub mod config;
pub mod report;
pub mod rules;

pub use api::{ApiClient, ApiError};
pub use auth::{Credential, CredentialStore, SessionManager};
pub use backoff::Backoff;
pub use config::Config;
pub use report::{ReportId, ReportSection};
