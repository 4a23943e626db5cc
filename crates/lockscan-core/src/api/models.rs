//! Wire types for the report API.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

/// Outcome of a report readiness check.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportStatus {
    /// Analysis is still running (HTTP 202).
    Pending,
    /// Report is ready; carries the report body as returned.
    Ready(Value),
}

/// Result of a manifest upload.
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub report_id: String,
    /// Whether the server-computed checksum matches the local SHA-1.
    pub checksum_ok: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadBody {
    pub status: bool,
    pub data: UploadData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadData {
    pub report_id: String,
    pub checksum: String,
}

/// `data` payload of the advisories section: package name to advisory list.
#[derive(Debug, Deserialize)]
pub struct AdvisoriesData {
    #[serde(default)]
    pub advisories: BTreeMap<String, Vec<AdvisoryEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryEntry {
    pub package_name: String,
    pub title: String,
    #[serde(default)]
    pub cve: Option<String>,
    pub link: String,
}

/// `data` payload of the sbom section.
#[derive(Debug, Deserialize)]
pub struct SbomData {
    #[serde(default)]
    pub packages: Vec<SbomPackage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SbomPackage {
    pub name: String,
    pub version: PackageVersion,
    #[serde(default)]
    pub last_update: Option<String>,
    #[serde(default)]
    pub advisories: Option<Vec<Value>>,
    #[serde(default)]
    pub license: Option<Vec<LicenseRef>>,
    #[serde(default)]
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackageVersion {
    pub installed: String,
    #[serde(default)]
    pub available: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LicenseRef {
    pub name: String,
}
