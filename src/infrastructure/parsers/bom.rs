//! CycloneDX bill-of-materials parser

use super::traits::{ParseContext, ReportParser, scalar_text};
use crate::application::errors::ParseError;
use crate::domain::{
    ComponentId, DependencyRecord, DependencyType, Reference, license_reference_url,
};
use serde_json::Value;

/// Parser for SBOM exports carrying license data
pub struct BomParser;

impl Default for BomParser {
    fn default() -> Self {
        Self::new()
    }
}

impl BomParser {
    pub fn new() -> Self {
        Self
    }
}

impl ReportParser for BomParser {
    fn dependency_type(&self) -> DependencyType {
        DependencyType::License
    }

    fn parse(
        &self,
        context: ParseContext<'_>,
        document: &Value,
    ) -> Result<Vec<DependencyRecord>, ParseError> {
        parse_bom(context.component_id, document)
    }
}

/// Extract one license record per BOM component
pub fn parse_bom(
    component_id: ComponentId,
    document: &Value,
) -> Result<Vec<DependencyRecord>, ParseError> {
    let components = document
        .get("components")
        .and_then(Value::as_array)
        .ok_or_else(|| ParseError::MissingField {
            field: "components".to_string(),
        })?;

    let mut records = Vec::with_capacity(components.len());

    for (position, component) in components.iter().enumerate() {
        let name = component
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ParseError::MissingField {
                field: format!("components[{}].name", position),
            })?;

        let version = scalar_text(component.get("version")).unwrap_or_default();
        let description = scalar_text(component.get("description")).unwrap_or_default();

        // Only the first license entry is authoritative
        let reference = component
            .get("licenses")
            .and_then(Value::as_array)
            .and_then(|licenses| licenses.first())
            .map(license_reference)
            .unwrap_or_default();

        records.push(DependencyRecord::new(
            component_id,
            DependencyType::License,
            name,
            version,
            reference,
            description,
        )?);
    }

    Ok(records)
}

/// Reference for one license choice: SPDX id with its URL, else free-text name
fn license_reference(entry: &Value) -> Reference {
    if let Some(license) = entry.get("license") {
        let text = |field: &str| {
            license
                .get(field)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        if let Some(id) = text("id") {
            return Reference::new(id, license_reference_url(id));
        }
        return text("name").map(Reference::unlinked).unwrap_or_default();
    }

    entry
        .get("expression")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|expression| !expression.is_empty())
        .map(Reference::unlinked)
        .unwrap_or_default()
}
