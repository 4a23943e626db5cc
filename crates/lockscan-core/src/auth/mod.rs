//! Authentication: credential persistence and the browser-based OAuth flow.
//!
//! This module provides:
//! - `Credential`/`CredentialStore`: a single JSON record under the user's
//!   config directory, with a sentinel value for the unauthenticated state
//! - `OAuthProvider`: authorization URL building and token grants against
//!   the SSO service
//! - `CallbackListener`: a one-shot loopback listener for the authorization
//!   redirect
//! - `SessionManager`: the login/refresh/status/logout flows on top

pub mod credential;
pub mod listener;
pub mod provider;
pub mod session;

use thiserror::Error;

pub use credential::{Credential, CredentialStore, SENTINEL_TOKEN};
pub use listener::CallbackListener;
pub use provider::{OAuthProvider, Profile};
pub use session::{AuthStatus, LoginOutcome, LoginSession, RefreshOutcome, SessionManager};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("You are currently not authenticated")]
    NotAuthenticated,

    /// The identity provider rejected a grant; carries its message.
    #[error("{0}")]
    Provider(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to persist credential: {0}")]
    Store(std::io::Error),

    #[error("Callback listener error: {0}")]
    Listener(std::io::Error),

    #[error("Invalid authorization endpoint: {0}")]
    InvalidEndpoint(String),
}
