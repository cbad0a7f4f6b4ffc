//! Domain entities representing core business concepts

use serde::Serialize;

use super::errors::DomainError;
use super::value_objects::*;

/// One normalized dependency of a component.
///
/// Records are built per request and never mutated afterwards; all records
/// sharing `(component_id, dependency_type)` form one generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyRecord {
    component_id: ComponentId,
    package_name: String,
    package_version: String,
    dependency_type: DependencyType,
    reference_name: String,
    reference_url: String,
    summary: String,
}

impl DependencyRecord {
    /// Create a new record, rejecting an empty package name
    pub fn new(
        component_id: ComponentId,
        dependency_type: DependencyType,
        package_name: impl Into<String>,
        package_version: impl Into<String>,
        reference: Reference,
        summary: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let package_name = package_name.into().trim().to_string();
        if package_name.is_empty() {
            return Err(DomainError::InvalidInput {
                field: "package_name".to_string(),
                message: "Package name cannot be empty".to_string(),
            });
        }

        Ok(Self {
            component_id,
            package_name,
            package_version: package_version.into().trim().to_string(),
            dependency_type,
            reference_name: reference.name,
            reference_url: reference.url,
            summary: summary.into(),
        })
    }

    pub fn component_id(&self) -> ComponentId {
        self.component_id
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn package_version(&self) -> &str {
        &self.package_version
    }

    pub fn dependency_type(&self) -> DependencyType {
        self.dependency_type
    }

    pub fn reference_name(&self) -> &str {
        &self.reference_name
    }

    pub fn reference_url(&self) -> &str {
        &self.reference_url
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Check that this record belongs to the given generation
    pub fn ensure_generation(
        &self,
        component_id: ComponentId,
        dependency_type: DependencyType,
    ) -> Result<(), DomainError> {
        if self.component_id == component_id && self.dependency_type == dependency_type {
            return Ok(());
        }

        Err(DomainError::GenerationMismatch {
            package: self.package_name.clone(),
            expected_component: component_id.value(),
            expected_type: dependency_type.to_string(),
            found_component: self.component_id.value(),
            found_type: self.dependency_type.to_string(),
        })
    }
}

/// The complete record set of one dependency type for one component; the
/// unit of atomic replacement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    component_id: ComponentId,
    dependency_type: DependencyType,
    records: Vec<DependencyRecord>,
}

impl Generation {
    /// Group records into a generation, rejecting records keyed elsewhere
    pub fn new(
        component_id: ComponentId,
        dependency_type: DependencyType,
        records: Vec<DependencyRecord>,
    ) -> Result<Self, DomainError> {
        for record in &records {
            record.ensure_generation(component_id, dependency_type)?;
        }

        Ok(Self {
            component_id,
            dependency_type,
            records,
        })
    }

    /// An empty generation; persisting it clears the pair
    pub fn empty(component_id: ComponentId, dependency_type: DependencyType) -> Self {
        Self {
            component_id,
            dependency_type,
            records: Vec::new(),
        }
    }

    pub fn component_id(&self) -> ComponentId {
        self.component_id
    }

    pub fn dependency_type(&self) -> DependencyType {
        self.dependency_type
    }

    pub fn records(&self) -> &[DependencyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Reference name and documentation URL attached to a record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reference {
    pub name: String,
    pub url: String,
}

impl Reference {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Reference with a name but no URL
    pub fn unlinked(name: impl Into<String>) -> Self {
        Self::new(name, String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(id: i64) -> ComponentId {
        ComponentId::new(id).unwrap()
    }

    #[test]
    fn test_record_trims_names_and_versions() {
        let record = DependencyRecord::new(
            component(5),
            DependencyType::License,
            "  left-pad ",
            " 1.0.0",
            Reference::new("MIT", license_reference_url("MIT")),
            "",
        )
        .unwrap();

        assert_eq!(record.package_name(), "left-pad");
        assert_eq!(record.package_version(), "1.0.0");
        assert_eq!(record.reference_name(), "MIT");
        assert!(record.reference_url().ends_with("MIT.html"));
    }

    #[test]
    fn test_record_rejects_empty_package_name() {
        let result = DependencyRecord::new(
            component(5),
            DependencyType::Cve,
            "   ",
            "",
            Reference::default(),
            "",
        );
        assert!(matches!(result, Err(DomainError::InvalidInput { .. })));
    }

    #[test]
    fn test_ensure_generation() {
        let record = DependencyRecord::new(
            component(5),
            DependencyType::Cve,
            "django",
            "3.2.0",
            Reference::unlinked("12345"),
            "",
        )
        .unwrap();

        assert!(record.ensure_generation(component(5), DependencyType::Cve).is_ok());
        assert!(matches!(
            record.ensure_generation(component(6), DependencyType::Cve),
            Err(DomainError::GenerationMismatch { .. })
        ));
        assert!(record
            .ensure_generation(component(5), DependencyType::License)
            .is_err());
    }

    #[test]
    fn test_generation_rejects_foreign_records() {
        let foreign = DependencyRecord::new(
            component(6),
            DependencyType::License,
            "serde",
            "1.0.0",
            Reference::default(),
            "",
        )
        .unwrap();

        let result = Generation::new(component(5), DependencyType::License, vec![foreign]);
        assert!(matches!(result, Err(DomainError::GenerationMismatch { .. })));
    }

    #[test]
    fn test_empty_generation() {
        let generation = Generation::empty(component(5), DependencyType::Cve);
        assert!(generation.is_empty());
        assert_eq!(generation.len(), 0);
        assert_eq!(generation.dependency_type(), DependencyType::Cve);
    }
}
