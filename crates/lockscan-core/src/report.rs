//! Report identifiers and section names.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Report ids are the SHA-1 of the uploaded manifest, hex encoded.
const REPORT_ID_LEN: usize = 40;

/// Identifier of a server-side analysis job.
///
/// Validated on construction so commands reject a malformed id before any
/// network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportId(String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid \"reportId\" argument: expected a 40-character lowercase hex string")]
pub struct InvalidReportId;

impl ReportId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ReportId {
    type Err = InvalidReportId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != REPORT_ID_LEN {
            return Err(InvalidReportId);
        }
        if !s.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
            return Err(InvalidReportId);
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The report sub-resources that can be fetched individually.
///
/// These double as the variable names rules may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSection {
    Advisories,
    Details,
    Sbom,
    Summary,
}

impl ReportSection {
    pub const ALL: [ReportSection; 4] = [
        ReportSection::Advisories,
        ReportSection::Details,
        ReportSection::Sbom,
        ReportSection::Summary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportSection::Advisories => "advisories",
            ReportSection::Details => "details",
            ReportSection::Sbom => "sbom",
            ReportSection::Summary => "summary",
        }
    }

    /// Variable names available to rule expressions.
    pub fn names() -> [&'static str; 4] {
        [
            ReportSection::Advisories.as_str(),
            ReportSection::Details.as_str(),
            ReportSection::Sbom.as_str(),
            ReportSection::Summary.as_str(),
        ]
    }
}

impl fmt::Display for ReportSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_report_ids() {
        assert!("0123456789abcdef0123456789abcdef01234567"
            .parse::<ReportId>()
            .is_ok());
        assert!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
            .parse::<ReportId>()
            .is_ok());
        assert!("da39a3ee5e6b4b0d3255bfef95601890afd80709"
            .parse::<ReportId>()
            .is_ok());
    }

    #[test]
    fn test_invalid_report_ids() {
        // empty / wrong length
        assert!("".parse::<ReportId>().is_err());
        assert!("abc123".parse::<ReportId>().is_err());
        assert!("0123456789abcdef0123456789abcdef0123456".parse::<ReportId>().is_err()); // 39
        assert!("0123456789abcdef0123456789abcdef012345678".parse::<ReportId>().is_err()); // 41

        // uppercase
        assert!("0123456789ABCDEF0123456789ABCDEF01234567"
            .parse::<ReportId>()
            .is_err());

        // non-hex characters
        assert!("zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz"
            .parse::<ReportId>()
            .is_err());
        assert!("0123456789abcdef0123456789abcdef0123456g"
            .parse::<ReportId>()
            .is_err());
        assert!("0123456789abcdef-0123456789abcdef0123456"
            .parse::<ReportId>()
            .is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        let id: ReportId = "da39a3ee5e6b4b0d3255bfef95601890afd80709".parse().unwrap();
        assert_eq!(id.to_string(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        assert_eq!(id.as_str(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn test_section_names() {
        assert_eq!(
            ReportSection::names(),
            ["advisories", "details", "sbom", "summary"]
        );
    }
}
