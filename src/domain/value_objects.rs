//! Domain value objects representing immutable concepts

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use super::errors::DomainError;

/// Base URL for SPDX license documentation pages
pub const LICENSE_REFERENCE_BASE: &str = "https://spdx.org/licenses/";

/// Base URL for NVD CVE detail pages
pub const CVE_REFERENCE_BASE: &str = "https://nvd.nist.gov/vuln/detail/";

/// Prefix the advisory feed puts in front of scanner-internal ids
const FEED_ID_PREFIX: &str = "pyup.io-";

/// External component identifier owning a set of dependency records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(i64);

impl ComponentId {
    /// Create a component id, rejecting zero and negative values
    pub fn new(id: i64) -> Result<Self, DomainError> {
        if id <= 0 {
            return Err(DomainError::InvalidInput {
                field: "compid".to_string(),
                message: format!("component id must be a positive integer, got {}", id),
            });
        }
        Ok(ComponentId(id))
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of dependency data a record carries.
///
/// Resolved once from the request's format discriminator; selects both the
/// parser and the generation the records are stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    License,
    Cve,
}

impl DependencyType {
    pub fn all() -> [DependencyType; 2] {
        [DependencyType::License, DependencyType::Cve]
    }

    /// Storage representation of this dependency type
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyType::License => "license",
            DependencyType::Cve => "cve",
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "license" | "licenses" | "bom" | "sbom" => Ok(DependencyType::License),
            "cve" | "cves" | "scan" | "vulnerability" => Ok(DependencyType::Cve),
            _ => Err(DomainError::InvalidDependencyType {
                value: s.to_string(),
            }),
        }
    }
}

/// One advisory known for a package in the vulnerability reference feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryEntry {
    pub advisory_id: String,
    /// Canonical CVE id, empty when the feed has none
    pub cve_id: String,
}

impl AdvisoryEntry {
    pub fn new(advisory_id: impl Into<String>, cve_id: impl Into<String>) -> Self {
        Self {
            advisory_id: advisory_id.into(),
            cve_id: cve_id.into(),
        }
    }

    /// Whether this entry describes the given scanner-internal id
    pub fn matches(&self, internal_id: &str) -> bool {
        normalize_advisory_id(&self.advisory_id) == normalize_advisory_id(internal_id)
    }
}

/// Reduce an advisory id to the bare scanner-internal id (`pyup.io-12345` -> `12345`)
pub fn normalize_advisory_id(id: &str) -> &str {
    let id = id.trim();
    id.strip_prefix(FEED_ID_PREFIX).unwrap_or(id)
}

fn cve_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^CVE-\d{4}-\d{4,}$").expect("valid CVE pattern"))
}

/// Check whether an id has the canonical `CVE-YYYY-NNNN` shape
pub fn is_cve_id(id: &str) -> bool {
    cve_pattern().is_match(id.trim())
}

/// Documentation URL for an SPDX license identifier
pub fn license_reference_url(license_id: &str) -> String {
    format!("{}{}.html", LICENSE_REFERENCE_BASE, license_id)
}

/// Detail page URL for a CVE id, or `None` when the id is not CVE-shaped
pub fn cve_reference_url(cve_id: &str) -> Option<String> {
    is_cve_id(cve_id).then(|| format!("{}{}", CVE_REFERENCE_BASE, cve_id.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_id_validation() {
        assert_eq!(ComponentId::new(5).unwrap().value(), 5);
        assert!(ComponentId::new(0).is_err());
        assert!(ComponentId::new(-3).is_err());
    }

    #[test]
    fn test_dependency_type_from_str() {
        assert_eq!("license".parse::<DependencyType>().unwrap(), DependencyType::License);
        assert_eq!("SBOM".parse::<DependencyType>().unwrap(), DependencyType::License);
        assert_eq!(" cve ".parse::<DependencyType>().unwrap(), DependencyType::Cve);
        assert_eq!("scan".parse::<DependencyType>().unwrap(), DependencyType::Cve);

        match "npm".parse::<DependencyType>() {
            Err(DomainError::InvalidDependencyType { value }) => assert_eq!(value, "npm"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_dependency_type_storage_names() {
        assert_eq!(DependencyType::License.as_str(), "license");
        assert_eq!(DependencyType::Cve.to_string(), "cve");
    }

    #[test]
    fn test_normalize_advisory_id() {
        assert_eq!(normalize_advisory_id("pyup.io-12345"), "12345");
        assert_eq!(normalize_advisory_id(" 12345 "), "12345");
        assert_eq!(normalize_advisory_id("PYSEC-2021-9"), "PYSEC-2021-9");
    }

    #[test]
    fn test_advisory_entry_matches_internal_id() {
        let entry = AdvisoryEntry::new("pyup.io-12345", "CVE-2021-0001");
        assert!(entry.matches("12345"));
        assert!(entry.matches("pyup.io-12345"));
        assert!(!entry.matches("123456"));
    }

    #[test]
    fn test_cve_shape() {
        assert!(is_cve_id("CVE-2021-0001"));
        assert!(is_cve_id("CVE-2019-1000123"));
        assert!(!is_cve_id("CVE-2021-01"));
        assert!(!is_cve_id("CVE-2021-0001, CVE-2021-0002"));
        assert!(!is_cve_id("12345"));
        assert!(!is_cve_id(""));
    }

    #[test]
    fn test_reference_urls() {
        assert_eq!(
            license_reference_url("MIT"),
            "https://spdx.org/licenses/MIT.html"
        );
        assert_eq!(
            cve_reference_url("CVE-2021-0001").as_deref(),
            Some("https://nvd.nist.gov/vuln/detail/CVE-2021-0001")
        );
        assert_eq!(cve_reference_url("12345"), None);
    }
}
