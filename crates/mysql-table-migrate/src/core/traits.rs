//! Core traits for reading from the source and writing to the destination.
//!
//! - [`CatalogReader`]: catalog and count queries shared by both sides
//! - [`SourceReader`]: paged row extraction from the source
//! - [`TargetWriter`]: upserts and session settings on the destination
//!
//! The engine (comparator, copier, orchestrator) only talks to these traits,
//! so it can run against the MySQL drivers or against in-memory fakes.

use async_trait::async_trait;

use crate::error::Result;

use super::schema::ColumnMetadata;
use super::value::{SourceRow, SqlValue};

/// Options for reading one page of rows from a source table.
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// Table name.
    pub table: String,
    /// Columns to select, with types used for decoding.
    pub columns: Vec<ColumnMetadata>,
    /// Columns to order by (the primary key when there is one).
    pub order_by: Vec<String>,
    /// Rows to skip.
    pub offset: u64,
    /// Maximum rows to return.
    pub limit: usize,
}

/// Catalog access available on both sides of a migration.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Database (MySQL schema) this handle is bound to.
    fn database(&self) -> &str;

    /// List base tables in the database, ordered by name.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Check whether a table exists in the catalog.
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Exact row count via `COUNT(*)`.
    async fn exact_row_count(&self, table: &str) -> Result<i64>;

    /// Catalog row estimate. `None` when the catalog has no entry for the table.
    async fn estimated_row_count(&self, table: &str) -> Result<Option<i64>>;

    /// Column metadata in ordinal order. Empty when the table does not exist.
    async fn load_columns(&self, table: &str) -> Result<Vec<ColumnMetadata>>;

    /// Round-trip a trivial query.
    async fn test_connection(&self) -> Result<()>;

    /// Release the connection.
    async fn close(&self);
}

/// Read rows from a source database.
#[async_trait]
pub trait SourceReader: CatalogReader {
    /// Primary key column names in key order. Empty when the table has none.
    async fn load_primary_key(&self, table: &str) -> Result<Vec<String>>;

    /// Read one page of rows.
    async fn read_page(&self, request: &PageRequest) -> Result<Vec<SourceRow>>;
}

/// Write rows to a destination database.
#[async_trait]
pub trait TargetWriter: CatalogReader {
    /// Insert rows, updating existing rows that collide on a primary or unique key.
    ///
    /// `rows` are positional and match `columns`. Returns the number of rows sent.
    async fn upsert_rows(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<SqlValue>],
    ) -> Result<u64>;

    /// Toggle foreign-key checks for this session.
    async fn set_foreign_key_checks(&self, enabled: bool) -> Result<()>;

    /// Read the `is_locked` flag from the first row of a lock table.
    ///
    /// `None` when the table has no rows.
    async fn read_lock_flag(&self, lock_table: &str) -> Result<Option<bool>>;
}
