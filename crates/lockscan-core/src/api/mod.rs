//! REST API client module for the lockscan report service.
//!
//! This module provides the `ApiClient` for talking to the report API:
//! report readiness polling, section retrieval for validation, manifest
//! upload and package lookups.
//!
//! Every request carries a bearer token. An unauthenticated client sends the
//! sentinel token and gets the service's 401 back, which keeps the call sites
//! free of "maybe we have a token" branching.

pub mod client;
pub mod error;
pub mod models;

pub use client::ApiClient;
pub use error::ApiError;
pub use models::{ReportStatus, UploadReceipt};
