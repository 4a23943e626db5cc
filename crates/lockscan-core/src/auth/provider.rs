//! OAuth2 provider: authorization URL, token grants, resource owner lookup.

use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use crate::config::Config;

use super::credential::Credential;
use super::AuthError;

/// Token endpoint requests should fail well before a human gives up.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Error shape the SSO service uses; `message` is a fallback some proxies
/// produce instead.
#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Resource-owner profile, used for login/status confirmation messages.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Clone)]
pub struct OAuthProvider {
    client: Client,
    authorize_url: String,
    token_url: String,
    userinfo_url: String,
    client_id: String,
    client_secret: String,
    scopes: String,
}

impl OAuthProvider {
    pub fn new(config: &Config) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(format!(
                "lockscan/{} ({})",
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS
            ))
            .build()?;

        Ok(Self {
            client,
            authorize_url: config.authorize_url(),
            token_url: config.token_url(),
            userinfo_url: config.userinfo_url(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scopes: config.scopes.clone(),
        })
    }

    /// Build the browser authorization URL for the given redirect and nonce.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, AuthError> {
        let url = Url::parse_with_params(
            &self.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("scope", self.scopes.as_str()),
                ("state", state),
            ],
        )
        .map_err(|err| AuthError::InvalidEndpoint(err.to_string()))?;
        Ok(url.into())
    }

    /// Exchange an authorization code for a credential.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<Credential, AuthError> {
        debug!("exchanging authorization code");
        self.token_grant(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .await
    }

    /// Exchange a refresh token for a fresh credential.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Credential, AuthError> {
        debug!("refreshing access token");
        self.token_grant(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn token_grant(&self, params: &[(&str, &str)]) -> Result<Credential, AuthError> {
        let mut form: Vec<(&str, &str)> = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        form.extend_from_slice(params);

        let response = self.client.post(&self.token_url).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ProviderErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error_description.or(body.message).or(body.error))
                .unwrap_or_else(|| format!("token endpoint answered {status}"));
            return Err(AuthError::Provider(message));
        }

        let token: TokenResponse = response.json().await?;
        Ok(Credential {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token
                .expires_in
                .map(|seconds| Utc::now() + chrono::Duration::seconds(seconds)),
            token_type: token.token_type.unwrap_or_else(|| "Bearer".to_string()),
        })
    }

    /// Fetch the resource owner's profile.
    pub async fn resource_owner(&self, access_token: &str) -> Result<Profile, AuthError> {
        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Provider(format!(
                "profile endpoint answered {status}"
            )));
        }
        Ok(response.json().await?)
    }
}
