//! HTTP client for the lockscan report API.
//!
//! One `ApiClient` is built per command invocation from the loaded
//! configuration and credential. Report sections are fetched through the
//! generic backoff engine because analysis results become available
//! eventually; everything else is a one-shot call.

use std::path::Path;
use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use sha1::{Digest, Sha1};
use tracing::{debug, warn};

use crate::backoff::Backoff;
use crate::report::{ReportId, ReportSection};

use super::error::ApiError;
use super::models::{ReportStatus, UploadBody, UploadReceipt};

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Seconds between report readiness polls.
const POLL_INTERVAL_SECS: u64 = 5;

type RawResponse = (StatusCode, Option<Value>);

/// API client for the report service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    /// Create a new API client with the given bearer token.
    ///
    /// The token may be the unauthenticated sentinel; the service answers
    /// 401 and the error surfaces like any other API failure.
    pub fn new(base_url: &str, token: &str) -> Result<Self, ApiError> {
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
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a GET and return the status plus the parsed JSON body, if any.
    async fn get_raw(&self, path: &str) -> Result<RawResponse, ApiError> {
        let response = self
            .client
            .get(self.url(path))
            .header(header::ACCEPT, "application/json")
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("application/json"))
            .unwrap_or(false);

        let body = if is_json {
            response.json::<Value>().await.ok()
        } else {
            None
        };

        Ok((status, body))
    }

    /// Check whether the analysis for `id` has finished.
    pub async fn report_status(&self, id: &ReportId) -> Result<ReportStatus, ApiError> {
        let (status, body) = self.get_raw(&format!("/reports/{id}")).await?;
        if status == StatusCode::ACCEPTED {
            Ok(ReportStatus::Pending)
        } else if status == StatusCode::OK {
            Ok(ReportStatus::Ready(body.unwrap_or(Value::Null)))
        } else {
            Err(ApiError::from_status(status, body.as_ref()))
        }
    }

    /// Poll until the report is ready.
    ///
    /// With `wait` false a pending report is returned immediately. Otherwise
    /// the loop sleeps a fixed 5s between polls, bounded by `timeout_secs` of
    /// elapsed wall-clock time (0 waits forever). Any status other than
    /// pending ends the loop, ready or failed.
    pub async fn wait_for_report(
        &self,
        id: &ReportId,
        wait: bool,
        timeout_secs: u64,
    ) -> Result<ReportStatus, ApiError> {
        let started = tokio::time::Instant::now();
        loop {
            match self.report_status(id).await? {
                ReportStatus::Pending if wait => {
                    let elapsed = started.elapsed().as_secs();
                    if timeout_secs > 0 && elapsed >= timeout_secs {
                        return Err(ApiError::WaitTimeout(elapsed));
                    }
                    debug!(report_id = %id, elapsed, "report not ready, polling again");
                    tokio::time::sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;
                }
                status => return Ok(status),
            }
        }
    }

    /// Fetch one report section through the backoff engine and unwrap its
    /// `data` envelope.
    ///
    /// The decider treats 200 and anything >= 404 as terminal; every other
    /// status (including 202 while the analysis is still running) is retried
    /// until the attempt budget runs out.
    pub async fn fetch_section(
        &self,
        id: &ReportId,
        section: ReportSection,
        backoff: &Backoff,
    ) -> Result<Value, ApiError> {
        let path = format!("/reports/{id}/{section}");
        debug!(%section, "retrieving report section");

        let client = self.clone();
        let result = backoff
            .run(
                move || {
                    let client = client.clone();
                    let path = path.clone();
                    async move { client.get_raw(&path).await }
                },
                section_decider,
                |attempt, max_attempts| {
                    warn!(
                        %section,
                        attempt = attempt + 1,
                        max_attempts,
                        "section not available yet, retrying"
                    );
                },
            )
            .await;

        let (status, body) = result?;
        if status != StatusCode::OK {
            return Err(ApiError::from_status(status, body.as_ref()));
        }

        let body = body.ok_or_else(|| {
            ApiError::InvalidResponse(format!("expected a JSON body for \"{section}\""))
        })?;
        match body.get("data") {
            Some(data) => Ok(data.clone()),
            None => Err(ApiError::InvalidResponse(format!(
                "missing \"data\" in \"{section}\" payload"
            ))),
        }
    }

    /// Upload a dependency manifest for analysis.
    ///
    /// The file's SHA-1 doubles as the integrity check: the service echoes
    /// the checksum it computed and the receipt records whether they match.
    pub async fn upload_manifest(&self, manifest: &Path) -> Result<UploadReceipt, ApiError> {
        let bytes = tokio::fs::read(manifest).await?;
        let checksum = format!("{:x}", Sha1::digest(&bytes));

        let file_name = manifest
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "manifest".to_string());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("text/plain")?;
        let form = reqwest::multipart::Form::new().part("manifest", part);

        debug!(path = %manifest.display(), checksum = %checksum, "uploading manifest");
        let response = self
            .client
            .post(self.url("/upload"))
            .header(header::ACCEPT, "application/json")
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.json::<Value>().await.ok();
            return Err(ApiError::from_status(status, body.as_ref()));
        }

        let body: UploadBody = response
            .json()
            .await
            .map_err(|err| ApiError::InvalidResponse(err.to_string()))?;
        if !body.status {
            return Err(ApiError::InvalidResponse(
                "upload was not accepted by the service".to_string(),
            ));
        }

        Ok(UploadReceipt {
            checksum_ok: body.data.checksum == checksum,
            report_id: body.data.report_id,
        })
    }

    /// Look up package metadata by name and version tag.
    pub async fn package_info(&self, package: &str, tag: &str) -> Result<Value, ApiError> {
        let (status, body) = self.get_raw(&format!("/packages/{package}/{tag}")).await?;
        if status != StatusCode::OK {
            return Err(ApiError::from_status(status, body.as_ref()));
        }
        let body =
            body.ok_or_else(|| ApiError::InvalidResponse("expected a JSON body".to_string()))?;
        Ok(body.get("data").cloned().unwrap_or(body))
    }
}

/// Retry policy for section fetches.
///
/// Stops on success (200) or anything >= 404; 3xx and 401/403 stay inside the
/// retry budget. Network errors are retried the same way.
fn section_decider(
    attempt: u32,
    max_attempts: u32,
    result: &Result<RawResponse, ApiError>,
) -> bool {
    if attempt >= max_attempts {
        return false;
    }
    match result {
        Ok((status, _)) => *status != StatusCode::OK && status.as_u16() < 404,
        Err(_) => true,
    }
}
