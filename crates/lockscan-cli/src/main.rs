//! lockscan - command-line client for the lockscan.dev analysis service.
//!
//! Authenticates against the SSO service through a browser-based OAuth flow
//! and drives report uploads, retrieval and rule-based validation against
//! the report API.

mod cli;
mod commands;
mod output;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use lockscan_core::api::ApiClient;
use lockscan_core::auth::{CredentialStore, SessionManager};
use lockscan_core::config::Config;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

/// Initialize the tracing subscriber for logging
fn init_tracing(level_override: Option<&str>) {
    // RUST_LOG controls the level unless --log-level is given
    let filter = match level_override {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version land here with success kinds
            let failed = err.use_stderr();
            let _ = err.print();
            return if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_tracing(cli.log_level.as_deref());

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let config = Config::load()?;
    debug!(auth_file = %config.auth_file.display(), "configuration loaded");

    let store = CredentialStore::new(config.auth_file.clone());

    match cli.command {
        Commands::AuthLogin(args) => {
            let manager = SessionManager::new(&config, store)?;
            commands::auth::login(&manager, args.force).await
        }
        Commands::AuthRefresh(args) => {
            let manager = SessionManager::new(&config, store)?;
            commands::auth::refresh(&manager, args.force).await
        }
        Commands::AuthStatus => {
            let manager = SessionManager::new(&config, store)?;
            commands::auth::status(&manager).await
        }
        Commands::AuthLogout => {
            let manager = SessionManager::new(&config, store)?;
            commands::auth::logout(&manager)
        }
        Commands::AuthToken => {
            let manager = SessionManager::new(&config, store)?;
            commands::auth::token(&manager)
        }
        Commands::ManifestValidate(args) => {
            let api = api_client(&config, &store)?;
            commands::manifest::validate(&api, &args).await
        }
        Commands::ManifestReport(args) => {
            let api = api_client(&config, &store)?;
            commands::manifest::report(&api, &args).await
        }
        Commands::ManifestUpload(args) => {
            let api = api_client(&config, &store)?;
            commands::manifest::upload(&api, &args).await
        }
        Commands::Show(args) => {
            let api = api_client(&config, &store)?;
            commands::show::run(&api, &args).await
        }
    }
}

/// Build the report API client with whatever credential is on file.
///
/// The sentinel token rides along when unauthenticated; the service's 401
/// then surfaces through normal error reporting.
fn api_client(config: &Config, store: &CredentialStore) -> Result<ApiClient> {
    let credential = store.load();
    Ok(ApiClient::new(
        &config.api_base_url,
        &credential.access_token,
    )?)
}
