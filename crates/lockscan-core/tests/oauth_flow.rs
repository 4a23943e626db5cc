use std::path::Path;
use std::time::Duration;

use lockscan_core::auth::{
    AuthError, Credential, CredentialStore, LoginOutcome, RefreshOutcome, SessionManager,
};
use lockscan_core::config::Config;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer, dir: &Path) -> Config {
    Config {
        api_base_url: format!("{}/v0", server.uri()),
        sso_base_url: server.uri(),
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        scopes: "user.name user.email".to_string(),
        auth_file: dir.join("auth.json"),
    }
}

fn manager_for(server: &MockServer, dir: &Path) -> SessionManager {
    let config = config_for(server, dir);
    let store = CredentialStore::new(config.auth_file.clone());
    SessionManager::new(&config, store).unwrap()
}

fn stored_credential(dir: &Path, expired: bool) -> CredentialStore {
    let store = CredentialStore::new(dir.join("auth.json"));
    let offset = chrono::Duration::hours(if expired { -1 } else { 1 });
    store
        .save(&Credential {
            access_token: "old-access".to_string(),
            refresh_token: Some("old-refresh".to_string()),
            expires_at: Some(chrono::Utc::now() + offset),
            token_type: "Bearer".to_string(),
        })
        .unwrap();
    store
}

/// Pull the `state` query parameter out of the authorization URL.
fn state_from(authorization_url: &str) -> String {
    let url = reqwest::Url::parse(authorization_url).unwrap();
    url.query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .unwrap()
}

async fn send_callback(redirect_uri: &str, query: &str) -> String {
    let url = reqwest::Url::parse(redirect_uri).unwrap();
    let addr = format!(
        "{}:{}",
        url.host_str().unwrap(),
        url.port().unwrap()
    );
    let mut socket = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET /callback?{query} HTTP/1.1\r\nHost: localhost\r\n\r\n");
    socket.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    socket.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_login_flow_exchanges_code_and_persists_credential() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=code-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh-access",
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "fresh-refresh"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "Ada Lovelace",
            "email": "ada@example.com"
        })))
        .mount(&server)
        .await;

    let manager = manager_for(&server, dir.path());
    let session = manager.begin_login().await.unwrap();
    let state = state_from(session.authorization_url());
    let redirect_uri = session.redirect_uri().to_string();

    let callback = tokio::spawn(async move {
        // Give finish() a moment to start accepting.
        tokio::time::sleep(Duration::from_millis(50)).await;
        send_callback(&redirect_uri, &format!("code=code-123&state={state}")).await
    });

    let outcome = session.finish(std::future::pending()).await.unwrap();
    match outcome {
        LoginOutcome::Authenticated(profile) => assert_eq!(profile.name, "Ada Lovelace"),
        other => panic!("unexpected outcome: {other:?}"),
    }

    let response = callback.await.unwrap();
    assert!(response.starts_with("HTTP/1.1 302"), "got: {response}");
    assert!(response.contains("/authorization/success"));

    let stored = CredentialStore::new(dir.path().join("auth.json")).load();
    assert_eq!(stored.access_token, "fresh-access");
    assert_eq!(stored.refresh_token.as_deref(), Some("fresh-refresh"));
    assert!(!stored.has_expired());
}

#[tokio::test]
async fn test_login_rejects_mismatched_state_and_keeps_waiting() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    // The token endpoint must never be hit.
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let manager = manager_for(&server, dir.path());
    let session = manager.begin_login().await.unwrap();
    let redirect_uri = session.redirect_uri().to_string();

    let (cancel_tx, cancel_rx) = tokio::sync::oneshot::channel::<()>();
    let prober = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let stray = send_callback(&redirect_uri, "code=evil&state=wrong").await;
        assert!(stray.starts_with("HTTP/1.1 400"), "got: {stray}");
        let missing_code = send_callback(&redirect_uri, "state=also-wrong").await;
        assert!(missing_code.starts_with("HTTP/1.1 400"), "got: {missing_code}");
        cancel_tx.send(()).unwrap();
    });

    let outcome = session
        .finish(async {
            let _ = cancel_rx.await;
        })
        .await
        .unwrap();
    assert!(matches!(outcome, LoginOutcome::Cancelled));
    prober.await.unwrap();

    // No credential may exist after a cancelled login.
    assert!(!dir.path().join("auth.json").exists());
}

#[tokio::test]
async fn test_cancelled_login_writes_nothing() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let manager = manager_for(&server, dir.path());
    let session = manager.begin_login().await.unwrap();
    let outcome = session.finish(async {}).await.unwrap();

    assert!(matches!(outcome, LoginOutcome::Cancelled));
    assert!(!dir.path().join("auth.json").exists());
}

#[tokio::test]
async fn test_refresh_skips_network_when_unexpired() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    stored_credential(dir.path(), false);

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let manager = manager_for(&server, dir.path());
    assert_eq!(
        manager.refresh(false).await.unwrap(),
        RefreshOutcome::StillValid
    );
}

#[tokio::test]
async fn test_refresh_exchanges_refresh_token() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    stored_credential(dir.path(), true);

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "new-access",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server, dir.path());
    assert_eq!(
        manager.refresh(false).await.unwrap(),
        RefreshOutcome::Refreshed
    );

    let stored = CredentialStore::new(dir.path().join("auth.json")).load();
    assert_eq!(stored.access_token, "new-access");
    // the provider omitted a rotated refresh token, the old one is kept
    assert_eq!(stored.refresh_token.as_deref(), Some("old-refresh"));
}

#[tokio::test]
async fn test_failed_refresh_leaves_credential_untouched() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = stored_credential(dir.path(), true);
    let before = std::fs::read(store.path()).unwrap();

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "The refresh token has been revoked"
        })))
        .mount(&server)
        .await;

    let manager = manager_for(&server, dir.path());
    match manager.refresh(false).await {
        Err(AuthError::Provider(message)) => {
            assert_eq!(message, "The refresh token has been revoked");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let after = std::fs::read(store.path()).unwrap();
    assert_eq!(before, after, "credential file must be byte-for-byte unchanged");
}

#[tokio::test]
async fn test_authorization_url_carries_bound_redirect() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let manager = manager_for(&server, dir.path());
    let session = manager.begin_login().await.unwrap();

    let url = reqwest::Url::parse(session.authorization_url()).unwrap();
    assert_eq!(url.path(), "/authorize");
    let pairs: std::collections::HashMap<_, _> = url.query_pairs().collect();
    assert_eq!(pairs["response_type"], "code");
    assert_eq!(pairs["client_id"], "client-id");
    assert_eq!(pairs["redirect_uri"], session.redirect_uri());
    assert_eq!(pairs["scope"], "user.name user.email");
    assert_eq!(pairs["state"].len(), 32);
}
