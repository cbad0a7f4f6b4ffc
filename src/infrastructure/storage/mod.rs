//! Dependency store backends and connection pooling

pub mod memory;
pub mod pool;
pub mod postgres;
pub mod traits;

pub use memory::{MemoryConnection, MemoryStore};
pub use pool::{ConnectionManager, PoolSettings, PooledConnection, StorageContext};
pub use postgres::{PostgresConnection, PostgresConnector};
pub use traits::{StoreConnection, StoreConnector};
