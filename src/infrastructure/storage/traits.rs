//! Traits for dependency store backends

use crate::application::errors::StoreError;
use crate::domain::{ComponentId, DependencyRecord, DependencyType};
use async_trait::async_trait;

/// A single store connection able to run one transaction at a time
#[async_trait]
pub trait StoreConnection: Send + 'static {
    async fn begin(&mut self) -> Result<(), StoreError>;

    /// Delete the rows of one generation, or of every generation of the
    /// component when `dependency_type` is `None`. Returns the deleted row count.
    async fn delete_generation(
        &mut self,
        component_id: ComponentId,
        dependency_type: Option<DependencyType>,
    ) -> Result<u64, StoreError>;

    async fn insert_record(&mut self, record: &DependencyRecord) -> Result<(), StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;

    async fn rollback(&mut self) -> Result<(), StoreError>;

    /// Cheap liveness check used before handing a pooled connection out again
    async fn is_healthy(&mut self) -> bool;
}

/// Factory for new store connections
#[async_trait]
pub trait StoreConnector: Send + Sync + 'static {
    type Connection: StoreConnection;

    async fn connect(&self) -> Result<Self::Connection, StoreError>;

    /// Short backend name for logs
    fn backend(&self) -> &'static str;
}
