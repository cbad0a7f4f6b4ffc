//! In-process dependency store
//!
//! Keeps rows in memory with statement-log transactions and the same uniqueness
//! rule as the Postgres table. Used for local runs without a database and as
//! the store behind the test suite; failures can be injected per connection
//! attempt or per commit.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

use super::traits::{StoreConnection, StoreConnector};
use crate::application::errors::StoreError;
use crate::domain::{ComponentId, DependencyRecord, DependencyType};

#[derive(Debug, Default)]
struct MemoryInner {
    rows: Mutex<Vec<DependencyRecord>>,
    connect_attempts: AtomicU32,
    open_connections: AtomicU32,
    failing_connects: AtomicU32,
    failing_commits: AtomicU32,
}

/// Shared in-memory table; cloning yields another handle to the same rows
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` connection attempts fail at connection level
    pub fn fail_next_connects(&self, count: u32) {
        self.inner.failing_connects.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` commits fail at connection level
    pub fn fail_next_commits(&self, count: u32) {
        self.inner.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Number of connection attempts made so far, failed ones included
    pub fn connect_attempts(&self) -> u32 {
        self.inner.connect_attempts.load(Ordering::SeqCst)
    }

    /// Number of connections currently alive
    pub fn open_connections(&self) -> u32 {
        self.inner.open_connections.load(Ordering::SeqCst)
    }

    /// Snapshot of all committed rows
    pub async fn rows(&self) -> Vec<DependencyRecord> {
        self.inner.rows.lock().await.clone()
    }

    /// Committed rows of one generation
    pub async fn generation(
        &self,
        component_id: ComponentId,
        dependency_type: DependencyType,
    ) -> Vec<DependencyRecord> {
        self.inner
            .rows
            .lock()
            .await
            .iter()
            .filter(|row| {
                row.component_id() == component_id && row.dependency_type() == dependency_type
            })
            .cloned()
            .collect()
    }

    /// Insert rows directly, bypassing transactions
    pub async fn seed(&self, records: impl IntoIterator<Item = DependencyRecord>) {
        self.inner.rows.lock().await.extend(records);
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn same_key(a: &DependencyRecord, b: &DependencyRecord) -> bool {
    a.component_id() == b.component_id()
        && a.dependency_type() == b.dependency_type()
        && a.package_name() == b.package_name()
}

fn in_scope(
    row: &DependencyRecord,
    component_id: ComponentId,
    dependency_type: Option<DependencyType>,
) -> bool {
    row.component_id() == component_id
        && dependency_type.is_none_or(|kind| row.dependency_type() == kind)
}

fn duplicate_key(record: &DependencyRecord) -> StoreError {
    StoreError::Integrity {
        message: format!(
            "duplicate key (compid, deptype, packagename)=({}, {}, {})",
            record.component_id(),
            record.dependency_type(),
            record.package_name()
        ),
    }
}

/// A statement recorded by an open transaction
#[derive(Debug, Clone)]
enum Statement {
    Delete {
        component_id: ComponentId,
        dependency_type: Option<DependencyType>,
    },
    Insert(DependencyRecord),
}

impl Statement {
    fn component_id(&self) -> ComponentId {
        match self {
            Statement::Delete { component_id, .. } => *component_id,
            Statement::Insert(record) => record.component_id(),
        }
    }
}

/// Apply statements in order; stops at the first key violation
fn apply<'a>(
    rows: &mut Vec<DependencyRecord>,
    statements: impl IntoIterator<Item = &'a Statement>,
) -> Result<(), StoreError> {
    for statement in statements {
        match statement {
            Statement::Delete {
                component_id,
                dependency_type,
            } => rows.retain(|row| !in_scope(row, *component_id, *dependency_type)),
            Statement::Insert(record) => {
                if rows.iter().any(|row| same_key(row, record)) {
                    return Err(duplicate_key(record));
                }
                rows.push(record.clone());
            }
        }
    }
    Ok(())
}

#[async_trait]
impl StoreConnector for MemoryStore {
    type Connection = MemoryConnection;

    async fn connect(&self) -> Result<MemoryConnection, StoreError> {
        self.inner.connect_attempts.fetch_add(1, Ordering::SeqCst);

        if take_one(&self.inner.failing_connects) {
            return Err(StoreError::Connection {
                message: "connection refused (simulated)".to_string(),
            });
        }

        self.inner.open_connections.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryConnection {
            store: self.inner.clone(),
            staged: None,
        })
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Connection to a [`MemoryStore`].
///
/// A transaction records its statements and replays them against the live
/// table under the table lock on commit, so concurrent transactions touching
/// other keys never overwrite each other.
#[derive(Debug)]
pub struct MemoryConnection {
    store: Arc<MemoryInner>,
    staged: Option<Vec<Statement>>,
}

impl MemoryConnection {
    fn staged(&self) -> Result<&[Statement], StoreError> {
        self.staged.as_deref().ok_or_else(no_transaction)
    }

    /// Rows of one component as this transaction sees them
    async fn component_view(
        &self,
        component_id: ComponentId,
    ) -> Result<Vec<DependencyRecord>, StoreError> {
        let staged = self.staged()?;
        let mut rows: Vec<DependencyRecord> = self
            .store
            .rows
            .lock()
            .await
            .iter()
            .filter(|row| row.component_id() == component_id)
            .cloned()
            .collect();
        apply(
            &mut rows,
            staged
                .iter()
                .filter(|statement| statement.component_id() == component_id),
        )?;
        Ok(rows)
    }

    fn record(&mut self, statement: Statement) -> Result<(), StoreError> {
        self.staged
            .as_mut()
            .ok_or_else(no_transaction)?
            .push(statement);
        Ok(())
    }
}

fn no_transaction() -> StoreError {
    StoreError::Query {
        message: "no transaction in progress".to_string(),
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.store.open_connections.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    async fn begin(&mut self) -> Result<(), StoreError> {
        if self.staged.is_some() {
            return Err(StoreError::Query {
                message: "transaction already in progress".to_string(),
            });
        }
        self.staged = Some(Vec::new());
        Ok(())
    }

    async fn delete_generation(
        &mut self,
        component_id: ComponentId,
        dependency_type: Option<DependencyType>,
    ) -> Result<u64, StoreError> {
        let removed = self
            .component_view(component_id)
            .await?
            .iter()
            .filter(|row| in_scope(row, component_id, dependency_type))
            .count();
        self.record(Statement::Delete {
            component_id,
            dependency_type,
        })?;
        Ok(removed as u64)
    }

    async fn insert_record(&mut self, record: &DependencyRecord) -> Result<(), StoreError> {
        let visible = self.component_view(record.component_id()).await?;
        if visible.iter().any(|row| same_key(row, record)) {
            return Err(duplicate_key(record));
        }
        self.record(Statement::Insert(record.clone()))
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let staged = self.staged.take().ok_or_else(no_transaction)?;

        if take_one(&self.store.failing_commits) {
            return Err(StoreError::Connection {
                message: "connection reset during commit (simulated)".to_string(),
            });
        }

        let mut rows = self.store.rows.lock().await;
        let mut next = rows.clone();
        apply(&mut next, &staged)?;
        *rows = next;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.staged = None;
        Ok(())
    }

    async fn is_healthy(&mut self) -> bool {
        self.staged.is_none()
    }
}
