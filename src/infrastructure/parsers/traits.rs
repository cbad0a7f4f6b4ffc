//! Traits for report parsers

use crate::application::errors::ParseError;
use crate::domain::{ComponentId, DependencyRecord, DependencyType};
use crate::infrastructure::vulnerability_index::VulnerabilityIndex;
use serde_json::Value;

/// Inputs shared by every parser for one request
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub component_id: ComponentId,
    pub index: &'a VulnerabilityIndex,
}

/// Trait for turning an uploaded report into dependency records
pub trait ReportParser: Send + Sync {
    /// The generation this parser's records belong to
    fn dependency_type(&self) -> DependencyType;

    /// Parse the report; never touches storage
    fn parse(
        &self,
        context: ParseContext<'_>,
        document: &Value,
    ) -> Result<Vec<DependencyRecord>, ParseError>;
}

/// Registry holding one parser per dependency type
pub struct ParserRegistry {
    parsers: Vec<Box<dyn ReportParser>>,
}

impl ParserRegistry {
    /// Create a registry with all available parsers
    pub fn new() -> Self {
        let parsers: Vec<Box<dyn ReportParser>> = vec![
            Box::new(crate::infrastructure::parsers::bom::BomParser::new()),
            Box::new(crate::infrastructure::parsers::scan::VulnerabilityScanParser::new()),
        ];

        Self { parsers }
    }

    /// Select the parser for a dependency type
    pub fn parser_for(&self, dependency_type: DependencyType) -> Option<&dyn ReportParser> {
        self.parsers
            .iter()
            .find(|parser| parser.dependency_type() == dependency_type)
            .map(|parser| parser.as_ref())
    }

    /// Check if a dependency type has a parser
    pub fn is_supported(&self, dependency_type: DependencyType) -> bool {
        self.parser_for(dependency_type).is_some()
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Read an optional scalar field as text; numbers are rendered, null is absent
pub(crate) fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First present scalar among several field aliases
pub(crate) fn aliased_text(object: &Value, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .find_map(|alias| scalar_text(object.get(*alias)))
}
