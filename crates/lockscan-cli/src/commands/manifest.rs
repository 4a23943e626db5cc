//! Handlers for the `manifest:*` commands.

use anyhow::Result;
use colored::Colorize;
use lockscan_core::api::{ApiClient, ApiError, ReportStatus};
use lockscan_core::backoff::Backoff;
use lockscan_core::report::{ReportId, ReportSection};
use lockscan_core::rules::{self, Rule, ValidateError, Validator};
use tracing::debug;

use crate::cli::{ReportArgs, UploadArgs, ValidateArgs};
use crate::output;

pub async fn validate(api: &ApiClient, args: &ValidateArgs) -> Result<bool> {
    let report_id: ReportId = match args.report_id.parse() {
        Ok(id) => id,
        Err(err) => {
            eprintln!("{err}");
            return Ok(false);
        }
    };

    let mut all_rules = Rule::from_inline(&args.rules);
    debug!(count = all_rules.len(), "inline rules");
    if let Some(path) = &args.file {
        match Rule::from_file(path) {
            Ok(file_rules) => {
                debug!(count = file_rules.len(), path = %path.display(), "file rules");
                all_rules.extend(file_rules);
            }
            Err(err) => {
                eprintln!("Error: {err}");
                return Ok(false);
            }
        }
    }

    if args.lint {
        if all_rules.is_empty() {
            println!("No rules available to be linted");
            return Ok(false);
        }
        return match rules::lint(&all_rules, &ReportSection::names()) {
            Ok(()) => {
                println!("No errors were found.");
                Ok(true)
            }
            Err(err) => {
                println!("Syntax error: {err}");
                Ok(false)
            }
        };
    }

    if all_rules.is_empty() {
        println!("No rules available to be evaluated");
        return Ok(false);
    }
    if args.retry < 0 {
        println!("Retry must be a positive integer");
        return Ok(false);
    }

    let validator = Validator::new(api, Backoff::new(args.retry as u32));
    match validator.run(&report_id, &all_rules).await {
        Ok(()) => Ok(true),
        Err(ValidateError::RuleFailed { rule, message }) => {
            debug!(rule = %rule, "rule failed");
            println!("{message}");
            Ok(false)
        }
        Err(err) => {
            println!("{err}");
            Ok(false)
        }
    }
}

pub async fn report(api: &ApiClient, args: &ReportArgs) -> Result<bool> {
    if args.timeout < 0 {
        eprintln!("Invalid \"timeout\" option, it must be a positive integer");
        return Ok(false);
    }
    let report_id: ReportId = match args.report_id.parse() {
        Ok(id) => id,
        Err(err) => {
            eprintln!("{err}");
            return Ok(false);
        }
    };

    match api
        .wait_for_report(&report_id, args.wait, args.timeout as u64)
        .await
    {
        Ok(ReportStatus::Pending) => {
            println!("Report is not ready yet");
            return Ok(true);
        }
        Ok(ReportStatus::Ready(_)) => {}
        Err(ApiError::WaitTimeout(elapsed)) => {
            println!("Wait timeout, {elapsed} seconds elapsed");
            return Ok(false);
        }
        Err(err) => {
            print_api_error(&err);
            return Ok(false);
        }
    }

    // Sub-resources are one-shot here; only validation retries them.
    let single_attempt = Backoff::new(1);

    if args.summary {
        let data = match api
            .fetch_section(&report_id, ReportSection::Summary, &single_attempt)
            .await
        {
            Ok(data) => data,
            Err(err) => {
                print_api_error(&err);
                return Ok(false);
            }
        };
        let rows = output::summary_rows(&data);
        output::render_table("Report Summary", &["Entry", "Count"], &rows);
    }

    if args.advisories {
        let data = match api
            .fetch_section(&report_id, ReportSection::Advisories, &single_attempt)
            .await
        {
            Ok(data) => data,
            Err(err) => {
                print_api_error(&err);
                return Ok(false);
            }
        };
        let parsed: lockscan_core::api::models::AdvisoriesData =
            match serde_json::from_value(data) {
                Ok(parsed) => parsed,
                Err(_) => {
                    println!("Invalid API response format");
                    return Ok(false);
                }
            };
        let rows: Vec<Vec<String>> = parsed
            .advisories
            .values()
            .flatten()
            .map(|entry| {
                vec![
                    entry.package_name.clone(),
                    entry.title.clone(),
                    entry.cve.clone().unwrap_or_else(|| "n/a".to_string()),
                    entry.link.clone(),
                ]
            })
            .collect();
        output::render_table(
            "Package Advisories",
            &["Package", "Title", "CVE", "Link"],
            &rows,
        );
    }

    if args.sbom {
        let data = match api
            .fetch_section(&report_id, ReportSection::Sbom, &single_attempt)
            .await
        {
            Ok(data) => data,
            Err(err) => {
                print_api_error(&err);
                return Ok(false);
            }
        };
        let parsed: lockscan_core::api::models::SbomData = match serde_json::from_value(data) {
            Ok(parsed) => parsed,
            Err(_) => {
                println!("Invalid API response format");
                return Ok(false);
            }
        };
        let rows: Vec<Vec<String>> = parsed
            .packages
            .iter()
            .map(|package| {
                vec![
                    package.name.clone(),
                    package.version.installed.clone(),
                    package
                        .version
                        .available
                        .clone()
                        .unwrap_or_else(|| "n/a".to_string()),
                    package
                        .last_update
                        .as_deref()
                        .map(output::format_date)
                        .unwrap_or_else(|| "n/a".to_string()),
                    package
                        .advisories
                        .as_ref()
                        .map(|advisories| advisories.len().to_string())
                        .unwrap_or_else(|| "n/a".to_string()),
                    package
                        .license
                        .as_ref()
                        .map(|licenses| {
                            licenses
                                .iter()
                                .map(|license| license.name.as_str())
                                .collect::<Vec<_>>()
                                .join(", ")
                        })
                        .unwrap_or_else(|| "n/a".to_string()),
                    package.flags.join(", "),
                ]
            })
            .collect();
        output::render_table(
            "Software Bill Of Materials",
            &[
                "Package",
                "Version",
                "Latest version",
                "Last update",
                "Advisories",
                "License",
                "Flags",
            ],
            &rows,
        );
    }

    Ok(true)
}

pub async fn upload(api: &ApiClient, args: &UploadArgs) -> Result<bool> {
    if !args.manifest.is_file() {
        if args.id_only {
            return Ok(false);
        }
        let message = format!("File \"{}\" could not be found", args.manifest.display());
        if args.json {
            println!("{}", serde_json::json!({"error": message}));
        } else {
            println!("{message}");
        }
        return Ok(false);
    }

    match api.upload_manifest(&args.manifest).await {
        Ok(receipt) => {
            if args.id_only {
                print!("{}", receipt.report_id);
                return Ok(true);
            }
            if args.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "reportId": receipt.report_id,
                        "checksum": receipt.checksum_ok,
                    })
                );
                return Ok(true);
            }
            println!();
            println!("Report ID: {}", receipt.report_id.bold());
            println!(
                "Checksum: {}",
                if receipt.checksum_ok {
                    "OK".bold()
                } else {
                    "ERROR".red().bold()
                }
            );
            println!();
            Ok(true)
        }
        Err(err) => {
            if args.id_only {
                return Ok(false);
            }
            if args.json {
                let code = match &err {
                    ApiError::Status { status, .. } => Some(*status),
                    _ => None,
                };
                println!(
                    "{}",
                    serde_json::json!({
                        "error": err.to_string(),
                        "code": code,
                    })
                );
                return Ok(false);
            }
            print_api_error(&err);
            Ok(false)
        }
    }
}

fn print_api_error(err: &ApiError) {
    println!("Error: {err}");
    if let Some(message) = err.server_message() {
        println!("Message: {message}");
    }
}
