//! CLI argument parsing using clap derive API
//!
//! Purely declarative; no side effects or I/O. Command names keep the
//! `group:action` shape users know from the hosted service's docs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// lockscan -- command-line client for the lockscan.dev analysis service.
///
/// Use `lockscan <COMMAND> --help` for command details.
#[derive(Parser, Debug)]
#[command(name = "lockscan", version, about, long_about = None)]
pub struct Cli {
    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate with lockscan.dev.
    #[command(name = "auth:login")]
    AuthLogin(LoginArgs),

    /// Refresh stored authentication credentials.
    #[command(name = "auth:refresh")]
    AuthRefresh(RefreshArgs),

    /// View authentication status.
    #[command(name = "auth:status")]
    AuthStatus,

    /// Log out of lockscan.dev.
    #[command(name = "auth:logout")]
    AuthLogout,

    /// Print the access token the CLI is configured to use.
    #[command(name = "auth:token")]
    AuthToken,

    /// Validate an analysis report using expression-based rules.
    #[command(name = "manifest:validate")]
    ManifestValidate(ValidateArgs),

    /// View an analysis report.
    #[command(name = "manifest:report")]
    ManifestReport(ReportArgs),

    /// Upload a manifest file to be analysed.
    #[command(name = "manifest:upload")]
    ManifestUpload(UploadArgs),

    /// Show information about a package.
    #[command(name = "show", alias = "info")]
    Show(ShowArgs),
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Force a new login even if you are already authenticated.
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Force the token refresh even if it is not yet expired.
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// The report identification (unique 40-chars long string).
    pub report_id: String,

    /// Rule expression to be evaluated against the report contents.
    #[arg(short = 'r', long = "rule")]
    pub rules: Vec<String>,

    /// Load rule expressions from a JSON file.
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Lint the rules without fetching any report data.
    #[arg(long)]
    pub lint: bool,

    /// Number of times to attempt retrieving report data before giving up.
    #[arg(long, default_value_t = 3, allow_negative_numbers = true)]
    pub retry: i64,
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// The report identification (unique 40-chars long string).
    pub report_id: String,

    /// Wait until the report is ready.
    #[arg(short, long)]
    pub wait: bool,

    /// Seconds to wait for the analysis to finish (0 waits forever).
    #[arg(short, long, default_value_t = 60, allow_negative_numbers = true)]
    pub timeout: i64,

    /// Include the summary metrics in the output.
    #[arg(long)]
    pub summary: bool,

    /// Include the advisories list in the output.
    #[arg(long)]
    pub advisories: bool,

    /// Include the Software Bill of Materials in the output.
    #[arg(long)]
    pub sbom: bool,
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// The manifest file that will be uploaded.
    pub manifest: PathBuf,

    /// Format the output as JSON.
    #[arg(long)]
    pub json: bool,

    /// Print only the report id, for use by other commands.
    #[arg(long)]
    pub id_only: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// The name of the package to look up.
    pub package: String,

    /// The version tag.
    #[arg(long, default_value = "latest")]
    pub tag: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_validate_command() {
        let cli = Cli::parse_from([
            "lockscan",
            "manifest:validate",
            "da39a3ee5e6b4b0d3255bfef95601890afd80709",
            "--rule",
            "count(advisories) == 0",
            "-r",
            "summary != null",
            "--retry",
            "5",
        ]);
        match cli.command {
            Commands::ManifestValidate(args) => {
                assert_eq!(args.rules.len(), 2);
                assert_eq!(args.retry, 5);
                assert!(!args.lint);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_report_defaults() {
        let cli = Cli::parse_from([
            "lockscan",
            "manifest:report",
            "da39a3ee5e6b4b0d3255bfef95601890afd80709",
        ]);
        match cli.command {
            Commands::ManifestReport(args) => {
                assert!(!args.wait);
                assert_eq!(args.timeout, 60);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_show_alias() {
        let cli = Cli::parse_from(["lockscan", "info", "left-pad"]);
        match cli.command {
            Commands::Show(args) => {
                assert_eq!(args.package, "left-pad");
                assert_eq!(args.tag, "latest");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
