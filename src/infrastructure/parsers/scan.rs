//! Vulnerability scan parser (safety report formats)

use super::traits::{ParseContext, ReportParser, aliased_text, scalar_text};
use crate::application::errors::ParseError;
use crate::domain::{ComponentId, DependencyRecord, DependencyType};
use crate::infrastructure::vulnerability_index::VulnerabilityIndex;
use serde_json::Value;

const VERSION_FIELDS: &[&str] = &["package_version", "analyzed_version", "installed_version"];
const SUMMARY_FIELDS: &[&str] = &["summary", "advisory"];
const ID_FIELDS: &[&str] = &["vulnerability_id", "id"];

/// One finding after envelope and alias handling
#[derive(Debug)]
struct Finding {
    package_name: String,
    package_version: String,
    summary: String,
    advisory_id: String,
}

/// Parser for vulnerability scan reports
pub struct VulnerabilityScanParser;

impl Default for VulnerabilityScanParser {
    fn default() -> Self {
        Self::new()
    }
}

impl VulnerabilityScanParser {
    pub fn new() -> Self {
        Self
    }
}

impl ReportParser for VulnerabilityScanParser {
    fn dependency_type(&self) -> DependencyType {
        DependencyType::Cve
    }

    fn parse(
        &self,
        context: ParseContext<'_>,
        document: &Value,
    ) -> Result<Vec<DependencyRecord>, ParseError> {
        parse_vulnerability_scan(context.component_id, document, context.index)
    }
}

/// Extract one CVE record per finding, resolving advisory ids through the index
pub fn parse_vulnerability_scan(
    component_id: ComponentId,
    document: &Value,
    index: &VulnerabilityIndex,
) -> Result<Vec<DependencyRecord>, ParseError> {
    let findings = findings(document)?;
    let mut records = Vec::with_capacity(findings.len());

    for finding in findings {
        let reference = index.resolve(&finding.package_name, &finding.advisory_id);
        records.push(DependencyRecord::new(
            component_id,
            DependencyType::Cve,
            finding.package_name,
            finding.package_version,
            reference,
            finding.summary,
        )?);
    }

    Ok(records)
}

/// Unwrap the accepted envelopes into findings
fn findings(document: &Value) -> Result<Vec<Finding>, ParseError> {
    let (items, path) = match document {
        Value::Array(items) => (items, "findings"),
        Value::Object(object) => {
            let items = object
                .get("vulnerabilities")
                .and_then(Value::as_array)
                .ok_or_else(|| ParseError::MissingField {
                    field: "vulnerabilities".to_string(),
                })?;
            (items, "vulnerabilities")
        }
        _ => {
            return Err(ParseError::InvalidField {
                field: "body".to_string(),
                expected: "a list of findings or an object with a vulnerabilities list"
                    .to_string(),
            });
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(position, item)| {
            let location = format!("{}[{}]", path, position);
            match item {
                Value::Object(_) => object_finding(item, &location),
                Value::Array(fields) => positional_finding(fields, &location),
                _ => Err(ParseError::InvalidField {
                    field: location,
                    expected: "an object or an array".to_string(),
                }),
            }
        })
        .collect()
}

fn required(value: Option<String>, location: &str, field: &str) -> Result<String, ParseError> {
    value
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| ParseError::MissingField {
            field: format!("{}.{}", location, field),
        })
}

fn object_finding(item: &Value, location: &str) -> Result<Finding, ParseError> {
    Ok(Finding {
        package_name: required(
            item.get("package_name")
                .and_then(Value::as_str)
                .map(str::to_string),
            location,
            "package_name",
        )?,
        package_version: aliased_text(item, VERSION_FIELDS).unwrap_or_default(),
        summary: aliased_text(item, SUMMARY_FIELDS).unwrap_or_default(),
        advisory_id: required(aliased_text(item, ID_FIELDS), location, "vulnerability_id")?,
    })
}

/// `[package_name, affected_spec, installed_version, advisory, id, ...]`
fn positional_finding(fields: &[Value], location: &str) -> Result<Finding, ParseError> {
    Ok(Finding {
        package_name: required(
            fields.first().and_then(Value::as_str).map(str::to_string),
            location,
            "package_name",
        )?,
        package_version: scalar_text(fields.get(2)).unwrap_or_default(),
        summary: scalar_text(fields.get(3)).unwrap_or_default(),
        advisory_id: required(scalar_text(fields.get(4)), location, "vulnerability_id")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AdvisoryEntry;
    use serde_json::json;

    fn component() -> ComponentId {
        ComponentId::new(7).unwrap()
    }

    fn index() -> VulnerabilityIndex {
        VulnerabilityIndex::from_entries([(
            "django".to_string(),
            vec![
                AdvisoryEntry::new("pyup.io-11111", "CVE-2019-0002"),
                AdvisoryEntry::new("pyup.io-12345", "CVE-2021-0001"),
            ],
        )])
    }

    #[test]
    fn test_matched_finding_uses_canonical_cve() {
        let document = json!([{
            "package_name": "django",
            "analyzed_version": "3.2.0",
            "advisory": "SQL injection in QuerySet",
            "vulnerability_id": "12345"
        }]);

        let records = parse_vulnerability_scan(component(), &document, &index()).unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.dependency_type(), DependencyType::Cve);
        assert_eq!(record.package_name(), "django");
        assert_eq!(record.package_version(), "3.2.0");
        assert_eq!(record.summary(), "SQL injection in QuerySet");
        assert_eq!(record.reference_name(), "CVE-2021-0001");
        assert_eq!(
            record.reference_url(),
            "https://nvd.nist.gov/vuln/detail/CVE-2021-0001"
        );
    }

    #[test]
    fn test_unmatched_finding_keeps_internal_id() {
        let document = json!([
            {"package_name": "django", "package_version": "3.2.0", "vulnerability_id": "99999"},
            {"package_name": "requests", "package_version": "2.0.0", "vulnerability_id": "44444"}
        ]);

        let records = parse_vulnerability_scan(component(), &document, &index()).unwrap();

        for (record, id) in records.iter().zip(["99999", "44444"]) {
            assert_eq!(record.reference_name(), id);
            assert_eq!(record.reference_url(), "");
        }
    }

    #[test]
    fn test_safety_v2_envelope_with_numeric_ids() {
        let document = json!({
            "report_meta": {"scan_target": "environment"},
            "vulnerabilities": [{
                "package_name": "Django",
                "analyzed_version": "3.2.0",
                "advisory": "Old advisory",
                "vulnerability_id": 11111
            }]
        });

        let records = parse_vulnerability_scan(component(), &document, &index()).unwrap();
        assert_eq!(records[0].reference_name(), "CVE-2019-0002");
    }

    #[test]
    fn test_safety_v1_positional_findings() {
        let document = json!([
            ["django", "<3.2.1", "3.2.0", "SQL injection in QuerySet", "12345"],
            ["flask", "<1.0", "0.12", "Denial of service", "33333", null]
        ]);

        let records = parse_vulnerability_scan(component(), &document, &index()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].package_version(), "3.2.0");
        assert_eq!(records[0].reference_name(), "CVE-2021-0001");
        assert_eq!(records[1].package_name(), "flask");
        assert_eq!(records[1].summary(), "Denial of service");
        assert_eq!(records[1].reference_name(), "33333");
    }

    #[test]
    fn test_missing_package_name_names_its_index() {
        let document = json!([
            {"package_name": "django", "vulnerability_id": "12345"},
            {"package_version": "1.0", "vulnerability_id": "1"}
        ]);

        match parse_vulnerability_scan(component(), &document, &index()) {
            Err(ParseError::MissingField { field }) => {
                assert_eq!(field, "findings[1].package_name")
            }
            other => panic!("Expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_id_is_an_error() {
        let document = json!({"vulnerabilities": [{"package_name": "django"}]});

        match parse_vulnerability_scan(component(), &document, &index()) {
            Err(ParseError::MissingField { field }) => {
                assert_eq!(field, "vulnerabilities[0].vulnerability_id")
            }
            other => panic!("Expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_shapes() {
        assert!(matches!(
            parse_vulnerability_scan(component(), &json!("text"), &index()),
            Err(ParseError::InvalidField { .. })
        ));
        assert!(matches!(
            parse_vulnerability_scan(component(), &json!({"results": []}), &index()),
            Err(ParseError::MissingField { .. })
        ));
        assert!(matches!(
            parse_vulnerability_scan(component(), &json!([42]), &index()),
            Err(ParseError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_empty_report_yields_no_records() {
        let records = parse_vulnerability_scan(component(), &json!([]), &index()).unwrap();
        assert!(records.is_empty());
    }
}
