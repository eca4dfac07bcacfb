//! Storage collaborators: record types, reader/writer traits, and the
//! PostgreSQL driver.
//!
//! The engine never touches a connection directly; it is handed a
//! [`SourceReader`] and a [`TargetWriter`] (constructor injection), which is
//! what lets the orchestrator tests run against in-memory fakes.

mod postgres;

pub use postgres::{PgSourceReader, PgTargetWriter};

use crate::error::StorageError;
use async_trait::async_trait;

/// One row of the source relation. Read-only to this system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub id: i64,
    pub name: String,
    pub value: String,
}

/// One row of the target relation. Created or overwritten only by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRecord {
    pub id: i64,
    pub name: String,
    pub value: String,
}

/// Read access to the source relation.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Exact row count at call time.
    async fn count(&self) -> Result<i64, StorageError>;

    /// Physical on-disk size of the relation including indexes, per the
    /// store's own accounting. 0 when the store cannot report it.
    async fn physical_size(&self) -> Result<i64, StorageError>;

    /// Fetch one page of records ordered by id ascending. The stable sort
    /// key is what guarantees no row is skipped or duplicated across pages
    /// when rows are only ever appended after the probe.
    async fn fetch_page(&self, offset: i64, limit: i64) -> Result<Vec<SourceRecord>, StorageError>;
}

/// Write access to the target relation.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// Write a batch in one bulk operation with upsert-by-id semantics:
    /// replaying a page must neither raise a duplicate-key error nor change
    /// the stored content.
    async fn bulk_upsert(&self, records: &[TargetRecord]) -> Result<(), StorageError>;
}
