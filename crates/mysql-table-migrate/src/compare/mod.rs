//! Table comparison: the read-only preview of what a migration would do.
//!
//! Each table is compared independently. Catalog and count failures degrade
//! to sentinels (`-1`, `None`) so one unreadable table never hides the rest.

pub mod counts;
pub mod diff;

pub use counts::{count_rows, COUNT_UNAVAILABLE};
pub use diff::{SchemaDiff, TypeMismatch};

use std::fmt;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::traits::CatalogReader;

/// Migration readiness of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonStatus {
    /// Schemas agree and row counts match.
    Ready,
    /// Table does not exist in the destination.
    Missing,
    /// Columns, types or row counts differ.
    Mismatch,
    /// Source table has no rows.
    Empty,
    /// Not enough information to decide.
    Unknown,
}

impl ComparisonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonStatus::Ready => "ready",
            ComparisonStatus::Missing => "missing",
            ComparisonStatus::Mismatch => "mismatch",
            ComparisonStatus::Empty => "empty",
            ComparisonStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ComparisonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison of one table between source and destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableComparison {
    pub table: String,

    /// Source row count, `-1` when unavailable.
    pub source_count: i64,

    /// Destination row count. `None` when the table is absent or its count failed.
    pub dest_count: Option<i64>,

    pub exists_in_dest: bool,

    pub status: ComparisonStatus,

    /// `None` when source columns could not be read.
    pub schema_diff: Option<SchemaDiff>,
}

/// Derive a table's status. Rules apply in order; the first match wins.
pub fn classify(
    source_count: i64,
    exists_in_dest: bool,
    dest_count: Option<i64>,
    schema_diff: Option<&SchemaDiff>,
) -> ComparisonStatus {
    if source_count == 0 {
        return ComparisonStatus::Empty;
    }
    if !exists_in_dest {
        return ComparisonStatus::Missing;
    }
    if schema_diff.is_some_and(SchemaDiff::is_blocking) {
        return ComparisonStatus::Mismatch;
    }
    match dest_count {
        Some(dest) if dest != source_count => ComparisonStatus::Mismatch,
        Some(_) => ComparisonStatus::Ready,
        None => ComparisonStatus::Unknown,
    }
}

/// Compare one table. Never fails.
pub async fn compare_table<S, D>(
    source: &S,
    dest: &D,
    table: &str,
    approximate: bool,
) -> TableComparison
where
    S: CatalogReader + ?Sized,
    D: CatalogReader + ?Sized,
{
    let (source_count, (exists_in_dest, dest_count), schema_diff) = tokio::join!(
        count_rows(source, table, approximate),
        destination_info(dest, table, approximate),
        load_schema_diff(source, dest, table),
    );

    let status = classify(source_count, exists_in_dest, dest_count, schema_diff.as_ref());

    debug!(
        "Compared {}: source={} dest={:?} exists={} status={}",
        table, source_count, dest_count, exists_in_dest, status
    );

    TableComparison {
        table: table.to_string(),
        source_count,
        dest_count,
        exists_in_dest,
        status,
        schema_diff,
    }
}

/// Compare many tables concurrently, preserving input order.
pub async fn compare_tables<S, D>(
    source: &S,
    dest: &D,
    tables: &[String],
    approximate: bool,
) -> Vec<TableComparison>
where
    S: CatalogReader + ?Sized,
    D: CatalogReader + ?Sized,
{
    info!(
        "Comparing {} tables ({} counts)",
        tables.len(),
        if approximate { "approximate" } else { "exact" }
    );

    join_all(
        tables
            .iter()
            .map(|table| compare_table(source, dest, table, approximate)),
    )
    .await
}

/// Existence from the destination catalog, then a count when it exists.
async fn destination_info<D>(dest: &D, table: &str, approximate: bool) -> (bool, Option<i64>)
where
    D: CatalogReader + ?Sized,
{
    let exists = match dest.table_exists(table).await {
        Ok(exists) => exists,
        Err(e) => {
            debug!("Existence check failed for destination {}: {}", table, e);
            false
        }
    };

    if !exists {
        return (false, None);
    }

    let count = count_rows(dest, table, approximate).await;
    (true, (count != COUNT_UNAVAILABLE).then_some(count))
}

async fn load_schema_diff<S, D>(source: &S, dest: &D, table: &str) -> Option<SchemaDiff>
where
    S: CatalogReader + ?Sized,
    D: CatalogReader + ?Sized,
{
    let (source_cols, dest_cols) = tokio::join!(source.load_columns(table), dest.load_columns(table));

    let source_cols = match source_cols {
        Ok(cols) => cols,
        Err(e) => {
            debug!("Could not read source columns for {}: {}", table, e);
            return None;
        }
    };

    let dest_cols = dest_cols.unwrap_or_else(|e| {
        debug!("Could not read destination columns for {}: {}", table, e);
        Vec::new()
    });

    Some(SchemaDiff::between(&source_cols, &dest_cols))
}
