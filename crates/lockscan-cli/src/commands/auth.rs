//! Handlers for the `auth:*` commands.

use anyhow::Result;
use colored::Colorize;
use lockscan_core::auth::{AuthError, AuthStatus, LoginOutcome, RefreshOutcome, SessionManager};
use tracing::debug;

pub async fn login(manager: &SessionManager, force: bool) -> Result<bool> {
    if !manager.needs_login(force) {
        println!();
        println!("You are already authenticated");
        println!();
        return Ok(true);
    }

    let session = manager.begin_login().await?;
    println!();
    println!("Opening browser..");
    println!("{}", session.authorization_url());
    println!();

    // Best effort: the URL is printed above for when no browser opens.
    if let Err(err) = open_browser(session.authorization_url()) {
        debug!(error = %err, "could not open a browser");
    }

    match session.finish(shutdown_signal()).await? {
        LoginOutcome::Authenticated(profile) => {
            println!();
            println!("Authenticated as {}.", profile.name.bold());
            println!();
            Ok(true)
        }
        LoginOutcome::Cancelled => {
            println!();
            println!("Login cancelled");
            println!();
            Ok(false)
        }
    }
}

pub async fn refresh(manager: &SessionManager, force: bool) -> Result<bool> {
    match manager.refresh(force).await {
        Ok(RefreshOutcome::StillValid) => {
            println!();
            println!("Access token is not yet expired");
            println!();
            Ok(true)
        }
        Ok(RefreshOutcome::Refreshed) => {
            println!();
            println!("Token refreshed");
            println!();
            Ok(true)
        }
        Err(AuthError::NotAuthenticated) => {
            println!();
            println!("You are currently not authenticated");
            println!("Use {} instead", "auth:login".bold());
            println!();
            Ok(false)
        }
        Err(AuthError::Provider(message)) => {
            println!();
            println!(
                "Failed to refresh token, message from the authentication server: {}",
                message.red().bold()
            );
            println!();
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn status(manager: &SessionManager) -> Result<bool> {
    match manager.status() {
        AuthStatus::Unauthenticated => {
            println!();
            println!("You are currently not authenticated");
            println!();
        }
        AuthStatus::Expired { .. } => {
            println!();
            println!(
                "Your access token has expired, try to refresh it ({}) or login again ({})",
                "auth:refresh".bold(),
                "auth:login".bold()
            );
            println!();
        }
        AuthStatus::Authenticated { expires_at } => {
            let credential = manager.credential();
            let profile = manager.profile(&credential).await?;
            println!();
            println!("Authenticated as {}.", profile.name.bold());
            if let Some(expires_at) = expires_at {
                println!("Valid until: {}", expires_at.to_rfc3339().bold());
            }
            println!();
        }
    }
    Ok(true)
}

pub fn token(manager: &SessionManager) -> Result<bool> {
    let credential = manager.credential();
    println!();
    println!("Access token: {}", credential.access_token.bold());
    println!();
    if credential.has_expired() {
        println!("This token has already expired!");
        if let Some(expires_at) = credential.expires_at {
            println!("Expired in: {}", expires_at.to_rfc3339().bold());
        }
    }
    Ok(true)
}

pub fn logout(manager: &SessionManager) -> Result<bool> {
    match manager.logout() {
        Ok(true) => {
            println!();
            println!("You are now logged out");
            println!();
            Ok(true)
        }
        Ok(false) => {
            println!();
            println!("You are currently not authenticated");
            println!();
            Ok(true)
        }
        Err(err) => {
            println!();
            println!("Failed to remove credential file: {err}");
            println!();
            Ok(false)
        }
    }
}

/// Resolves when the user asks the process to stop.
///
/// On unix the login wait honors the usual termination signals; elsewhere
/// ctrl-c is the cancellation path.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt =
            signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        let mut terminate =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut hangup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");
        let mut quit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");

        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
            _ = hangup.recv() => {}
            _ = quit.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Open `url` in the user's default browser.
fn open_browser(url: &str) -> std::io::Result<()> {
    use std::process::{Command, Stdio};

    #[cfg(target_os = "macos")]
    let mut command = {
        let mut command = Command::new("open");
        command.arg(url);
        command
    };

    #[cfg(target_os = "windows")]
    let mut command = {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", url]);
        command
    };

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut command = {
        let mut command = Command::new("xdg-open");
        command.arg(url);
        command
    };

    command
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}
