//! Session manager: login, refresh, status and logout flows.
//!
//! The manager owns the credential store and the OAuth provider; commands
//! hold one manager per invocation and the credential file remains the sole
//! persistence boundary. Login never installs signal handlers: the caller
//! passes a cancellation future, which keeps the flow testable and lets the
//! CLI wire process signals to it.

use std::future::Future;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::debug;

use crate::config::Config;

use super::credential::{Credential, CredentialStore};
use super::listener::CallbackListener;
use super::provider::{OAuthProvider, Profile};
use super::AuthError;

/// Length of the CSRF state nonce echoed back by the provider.
const STATE_NONCE_LEN: usize = 32;

/// Authentication state derived from the stored credential.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthStatus {
    Unauthenticated,
    Expired { expires_at: DateTime<Utc> },
    Authenticated { expires_at: Option<DateTime<Utc>> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The token is not expired and the refresh was not forced.
    StillValid,
    Refreshed,
}

#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Authenticated(Profile),
    /// The cancellation future resolved before a valid callback arrived.
    Cancelled,
}

pub struct SessionManager {
    store: CredentialStore,
    provider: OAuthProvider,
    success_url: String,
}

impl SessionManager {
    pub fn new(config: &Config, store: CredentialStore) -> Result<Self, AuthError> {
        Ok(Self {
            store,
            provider: OAuthProvider::new(config)?,
            success_url: config.success_url(),
        })
    }

    pub fn credential(&self) -> Credential {
        self.store.load()
    }

    pub fn status(&self) -> AuthStatus {
        let credential = self.store.load();
        if !credential.is_authenticated() {
            return AuthStatus::Unauthenticated;
        }
        match credential.expires_at {
            Some(expires_at) if expires_at <= Utc::now() => AuthStatus::Expired { expires_at },
            expires_at => AuthStatus::Authenticated { expires_at },
        }
    }

    /// Whether `login` would actually start a browser flow.
    pub fn needs_login(&self, force: bool) -> bool {
        if force {
            return true;
        }
        let credential = self.store.load();
        !credential.is_authenticated() || credential.has_expired()
    }

    /// Bind the callback listener and prepare the authorization URL.
    ///
    /// The URL depends on the listener's port, so the listener must be live
    /// before the browser is pointed anywhere.
    pub async fn begin_login(&self) -> Result<LoginSession<'_>, AuthError> {
        let listener = CallbackListener::bind().await.map_err(AuthError::Listener)?;
        let state: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(STATE_NONCE_LEN)
            .map(char::from)
            .collect();
        let redirect_uri = listener.redirect_uri();
        let authorization_url = self.provider.authorization_url(&redirect_uri, &state)?;

        Ok(LoginSession {
            manager: self,
            listener,
            state,
            redirect_uri,
            authorization_url,
        })
    }

    /// Refresh the stored credential.
    ///
    /// A provider-side rejection leaves the previous credential untouched on
    /// disk; only an explicit re-login replaces a session the provider still
    /// might honor.
    pub async fn refresh(&self, force: bool) -> Result<RefreshOutcome, AuthError> {
        let current = self.store.load();
        if !current.is_authenticated() {
            return Err(AuthError::NotAuthenticated);
        }
        let Some(refresh_token) = current.refresh_token.clone() else {
            return Err(AuthError::NotAuthenticated);
        };
        if !current.has_expired() && !force {
            debug!("access token still valid, skipping refresh");
            return Ok(RefreshOutcome::StillValid);
        }

        let mut refreshed = self.provider.refresh(&refresh_token).await?;
        // Providers may omit the refresh token on rotation-less grants.
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = Some(refresh_token);
        }
        self.store.save(&refreshed).map_err(AuthError::Store)?;
        Ok(RefreshOutcome::Refreshed)
    }

    /// Fetch the resource-owner profile for a credential.
    pub async fn profile(&self, credential: &Credential) -> Result<Profile, AuthError> {
        self.provider.resource_owner(&credential.access_token).await
    }

    /// Remove the stored credential. `Ok(false)` when none was stored.
    pub fn logout(&self) -> Result<bool, AuthError> {
        self.store.delete().map_err(AuthError::Store)
    }
}

/// An in-flight login: listener bound, nonce generated, URL built.
pub struct LoginSession<'a> {
    manager: &'a SessionManager,
    listener: CallbackListener,
    state: String,
    redirect_uri: String,
    authorization_url: String,
}

impl LoginSession<'_> {
    pub fn authorization_url(&self) -> &str {
        &self.authorization_url
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Wait for the browser callback, then exchange and persist.
    ///
    /// Resolves on whichever comes first: a valid callback or `cancel`.
    /// Nothing is written to disk on cancellation, and the listener socket
    /// is released either way.
    pub async fn finish(self, cancel: impl Future<Output = ()>) -> Result<LoginOutcome, AuthError> {
        tokio::select! {
            _ = cancel => {
                debug!("login cancelled before a valid callback");
                Ok(LoginOutcome::Cancelled)
            }
            received = self.listener.wait_for_code(&self.state, &self.manager.success_url) => {
                let code = received.map_err(AuthError::Listener)?;
                let credential = self
                    .manager
                    .provider
                    .exchange_code(&code, &self.redirect_uri)
                    .await?;
                self.manager.store.save(&credential).map_err(AuthError::Store)?;
                let profile = self
                    .manager
                    .provider
                    .resource_owner(&credential.access_token)
                    .await?;
                Ok(LoginOutcome::Authenticated(profile))
            }
        }
    }
}
