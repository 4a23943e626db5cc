//! Client configuration.
//!
//! Holds the service endpoints, the OAuth client settings and the location
//! of the credential file. Production defaults can be overridden through
//! environment variables (`LOCKSCAN_API_URL`, `LOCKSCAN_SSO_URL`,
//! `LOCKSCAN_AUTH_FILE`), which is also how the test suite points the client
//! at a local mock server.
//!
//! The credential file lives at `~/.config/lockscan/auth.json`.

use std::path::PathBuf;

use anyhow::Result;

/// Application name used for the per-user config directory
const APP_NAME: &str = "lockscan";

/// Credential file name
const AUTH_FILE: &str = "auth.json";

/// Versioned base URL of the report API
const DEFAULT_API_BASE_URL: &str = "https://api.lockscan.dev/v0";

/// Base URL of the SSO service (authorization, token and profile endpoints)
const DEFAULT_SSO_BASE_URL: &str = "https://sso.lockscan.dev";

// "cli.lockscan.dev" OAuth app
const CLIENT_ID: &str = "9c2f41a07bd34b7f8e21c6d5a80f3b14";
const CLIENT_SECRET: &str = "3a8e5d90f4c011ee9d470242ac110002";

/// Scopes requested during login
const SCOPES: &str = "user.name user.email";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub sso_base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scopes: String,
    pub auth_file: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let auth_file = match std::env::var_os("LOCKSCAN_AUTH_FILE") {
            Some(path) => PathBuf::from(path),
            None => Self::default_auth_file()?,
        };

        Ok(Self {
            api_base_url: env_or("LOCKSCAN_API_URL", DEFAULT_API_BASE_URL),
            sso_base_url: env_or("LOCKSCAN_SSO_URL", DEFAULT_SSO_BASE_URL),
            client_id: CLIENT_ID.to_string(),
            client_secret: CLIENT_SECRET.to_string(),
            scopes: SCOPES.to_string(),
            auth_file,
        })
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/authorize", self.sso_base_url)
    }

    pub fn token_url(&self) -> String {
        format!("{}/token", self.sso_base_url)
    }

    pub fn userinfo_url(&self) -> String {
        format!("{}/userinfo", self.sso_base_url)
    }

    /// Landing page the browser is redirected to after a successful login
    pub fn success_url(&self) -> String {
        format!("{}/authorization/success", self.sso_base_url)
    }

    fn default_auth_file() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(AUTH_FILE))
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}
