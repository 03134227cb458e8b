//! Batch copier: moves one table from source to destination.
//!
//! Rows are read in offset pages, coerced to the destination's column kinds,
//! and merged with a bulk upsert. When a bulk upsert fails, the same rows are
//! retried one at a time so a single bad row costs only itself.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::compare::{count_rows, COUNT_UNAVAILABLE};
use crate::config::DEFAULT_BATCH_SIZE;
use crate::core::traits::{PageRequest, SourceReader, TargetWriter};
use crate::core::value::SqlValue;
use crate::error::Result;
use crate::transform::RowTransformer;

/// Skip reason: the source table has no rows.
pub const REASON_EMPTY_SOURCE: &str = "empty_source";
/// Skip reason: the destination has rows and overwrite was not granted.
pub const REASON_DESTINATION_NOT_EMPTY: &str = "destination_not_empty";
/// Error reason: the source row count could not be read.
pub const REASON_SOURCE_COUNT_UNAVAILABLE: &str = "source_count_unavailable";

/// Outcome category of one table's migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    Migrated,
    Skipped,
    Error,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStatus::Migrated => "migrated",
            MigrationStatus::Skipped => "skipped",
            MigrationStatus::Error => "error",
        }
    }
}

/// Result of migrating one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub table: String,

    pub status: MigrationStatus,

    /// Skip reason or error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Source row count, set when the table was copied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_count: Option<i64>,

    /// Source rows read, including rows dropped by coercion or insert failure.
    pub processed: u64,
}

impl MigrationResult {
    pub fn migrated(table: impl Into<String>, source_count: i64, processed: u64) -> Self {
        Self {
            table: table.into(),
            status: MigrationStatus::Migrated,
            reason: None,
            source_count: Some(source_count),
            processed,
        }
    }

    pub fn skipped(table: impl Into<String>, reason: &str) -> Self {
        Self {
            table: table.into(),
            status: MigrationStatus::Skipped,
            reason: Some(reason.to_string()),
            source_count: None,
            processed: 0,
        }
    }

    pub fn error(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            status: MigrationStatus::Error,
            reason: Some(reason.into()),
            source_count: None,
            processed: 0,
        }
    }
}

/// Configuration for the transfer engine.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Rows per source page.
    pub batch_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Statistics from copying one table.
#[derive(Debug, Clone, Default)]
pub struct TransferStats {
    /// Pages read from the source.
    pub pages: usize,

    /// Rows read from the source.
    pub rows_read: u64,

    /// Rows dropped by coercion.
    pub rows_rejected: u64,

    /// Rows accepted by the destination.
    pub rows_written: u64,

    /// Rows that failed even when inserted alone.
    pub rows_failed: u64,

    /// Time spent reading.
    pub read_time: Duration,

    /// Time spent writing.
    pub write_time: Duration,
}

/// Copies tables between one source and one destination handle.
pub struct TransferEngine<'a, S: ?Sized, T: ?Sized> {
    source: &'a S,
    target: &'a T,
    config: TransferConfig,
}

impl<'a, S, T> TransferEngine<'a, S, T>
where
    S: SourceReader + ?Sized,
    T: TargetWriter + ?Sized,
{
    pub fn new(source: &'a S, target: &'a T, config: TransferConfig) -> Self {
        Self {
            source,
            target,
            config,
        }
    }

    /// Copy one table.
    ///
    /// Skips and unreadable source counts come back as `Ok` results; an error
    /// means the copy stopped partway (for example a page read failed).
    pub async fn copy_table(&self, table: &str, overwrite: bool) -> Result<MigrationResult> {
        let source_count = count_rows(self.source, table, false).await;
        if source_count == COUNT_UNAVAILABLE {
            return Ok(MigrationResult::error(table, REASON_SOURCE_COUNT_UNAVAILABLE));
        }
        if source_count == 0 {
            info!("{}: source is empty, skipping", table);
            return Ok(MigrationResult::skipped(table, REASON_EMPTY_SOURCE));
        }

        let dest_count = match self.target.exact_row_count(table).await {
            Ok(count) => count,
            Err(e) => {
                debug!("{}: destination count failed, treating as empty: {}", table, e);
                0
            }
        };
        if dest_count > 0 && !overwrite {
            info!(
                "{}: destination has {} rows and overwrite is off, skipping",
                table, dest_count
            );
            return Ok(MigrationResult::skipped(table, REASON_DESTINATION_NOT_EMPTY));
        }

        let dest_columns = self.target.load_columns(table).await?;
        let transformer = RowTransformer::new(&dest_columns);
        let columns = transformer.column_names();
        if transformer.is_empty() {
            warn!(
                "{}: destination has no columns, rows will be read but not written",
                table
            );
        }

        let source_columns = self.source.load_columns(table).await?;
        let order_by = match self.source.load_primary_key(table).await {
            Ok(pk) => pk,
            Err(e) => {
                warn!("{}: could not read primary key, paging unordered: {}", table, e);
                Vec::new()
            }
        };

        info!(
            "{}: copying {} rows in batches of {}",
            table, source_count, self.config.batch_size
        );

        let mut stats = TransferStats::default();
        let mut offset: u64 = 0;

        while (offset as i64) < source_count {
            let request = PageRequest {
                table: table.to_string(),
                columns: source_columns.clone(),
                order_by: order_by.clone(),
                offset,
                limit: self.config.batch_size,
            };

            let read_start = Instant::now();
            let page = self.source.read_page(&request).await?;
            stats.read_time += read_start.elapsed();

            if page.is_empty() {
                break;
            }
            let read = page.len();
            stats.pages += 1;
            stats.rows_read += read as u64;

            let rows: Vec<Vec<SqlValue>> = page
                .iter()
                .filter_map(|row| match transformer.transform(row) {
                    Ok(values) => Some(values),
                    Err(rejection) => {
                        trace!("{}: dropping row: {}", table, rejection);
                        stats.rows_rejected += 1;
                        None
                    }
                })
                .collect();

            if !columns.is_empty() && !rows.is_empty() {
                let write_start = Instant::now();
                self.write_batch(table, &columns, &rows, &mut stats).await;
                stats.write_time += write_start.elapsed();
            }

            offset += read as u64;
            debug!("{}: {}/{} rows read", table, offset, source_count);

            if read < self.config.batch_size {
                break;
            }
        }

        info!(
            "{}: read {} rows in {} pages, wrote {}, rejected {}, failed {} (read {:?}, write {:?})",
            table,
            stats.rows_read,
            stats.pages,
            stats.rows_written,
            stats.rows_rejected,
            stats.rows_failed,
            stats.read_time,
            stats.write_time
        );

        Ok(MigrationResult::migrated(table, source_count, stats.rows_read))
    }

    /// Bulk upsert, falling back to one row per statement.
    async fn write_batch(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<SqlValue>],
        stats: &mut TransferStats,
    ) {
        match self.target.upsert_rows(table, columns, rows).await {
            Ok(written) => {
                stats.rows_written += written;
                return;
            }
            Err(e) => {
                warn!(
                    "Batch failed for {}, attempting row-by-row fallback: {}",
                    table, e
                );
            }
        }

        for row in rows {
            match self
                .target
                .upsert_rows(table, columns, std::slice::from_ref(row))
                .await
            {
                Ok(written) => stats.rows_written += written,
                Err(e) => {
                    error!("Row insert failed in {}: {}", table, e);
                    stats.rows_failed += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDatabase, FakeTable};

    fn engine<'a>(
        source: &'a FakeDatabase,
        target: &'a FakeDatabase,
    ) -> TransferEngine<'a, FakeDatabase, FakeDatabase> {
        TransferEngine::new(source, target, TransferConfig::default())
    }

    #[tokio::test]
    async fn test_copies_in_pages_of_500() {
        let source = FakeDatabase::new("src").with_table(FakeTable::users(1200));
        let target = FakeDatabase::new("dst").with_table(FakeTable::users(0));

        let result = engine(&source, &target).copy_table("users", false).await.unwrap();

        assert_eq!(result, MigrationResult::migrated("users", 1200, 1200));
        assert_eq!(source.page_sizes(), vec![500, 500, 200]);
        assert_eq!(target.upsert_sizes(), vec![500, 500, 200]);
        assert_eq!(target.row_count("users"), 1200);
        assert_eq!(
            target.rows("users")[0].get("created_at"),
            Some(&SqlValue::Text("2024-01-15 10:30:00".into()))
        );
    }

    #[tokio::test]
    async fn test_empty_source_is_skipped() {
        let source = FakeDatabase::new("src").with_table(FakeTable::users(0));
        let target = FakeDatabase::new("dst").with_table(FakeTable::users(0));

        let result = engine(&source, &target).copy_table("users", true).await.unwrap();
        assert_eq!(result, MigrationResult::skipped("users", REASON_EMPTY_SOURCE));
        assert!(source.page_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_non_empty_destination_without_overwrite_is_skipped() {
        let source = FakeDatabase::new("src").with_table(FakeTable::orders(50));
        let target = FakeDatabase::new("dst").with_table(FakeTable::orders(50));

        let result = engine(&source, &target).copy_table("orders", false).await.unwrap();
        assert_eq!(result.status, MigrationStatus::Skipped);
        assert_eq!(result.reason.as_deref(), Some(REASON_DESTINATION_NOT_EMPTY));
        assert_eq!(result.processed, 0);
        assert!(target.upsert_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_overwrite_rerun_is_idempotent() {
        let source = FakeDatabase::new("src").with_table(FakeTable::orders(50));
        let target = FakeDatabase::new("dst").with_table(FakeTable::orders(0));
        let copier = engine(&source, &target);

        let first = copier.copy_table("orders", true).await.unwrap();
        let second = copier.copy_table("orders", true).await.unwrap();

        assert_eq!(first.status, MigrationStatus::Migrated);
        assert_eq!(first, second);
        assert_eq!(target.row_count("orders"), 50);
    }

    #[tokio::test]
    async fn test_invalid_date_row_dropped_but_processed() {
        let mut users = FakeTable::users(3);
        users.rows[1].insert("created_at".into(), "not-a-date".into());
        let source = FakeDatabase::new("src").with_table(users);
        let target = FakeDatabase::new("dst").with_table(FakeTable::users(0));

        let result = engine(&source, &target).copy_table("users", false).await.unwrap();

        assert_eq!(result.processed, 3);
        assert_eq!(target.row_count("users"), 2);
        let ids: Vec<_> = target
            .rows("users")
            .iter()
            .map(|r| r.get("id").cloned())
            .collect();
        assert_eq!(ids, vec![Some(SqlValue::I64(1)), Some(SqlValue::I64(3))]);
    }

    #[tokio::test]
    async fn test_bulk_failure_falls_back_to_single_rows() {
        let source = FakeDatabase::new("src").with_table(FakeTable::users(4));
        let target = FakeDatabase::new("dst")
            .with_table(FakeTable::users(0).failing_bulk().rejecting_id(3));

        let result = engine(&source, &target).copy_table("users", false).await.unwrap();

        assert_eq!(result, MigrationResult::migrated("users", 4, 4));
        assert_eq!(target.upsert_sizes(), vec![1, 1, 1]);
        assert_eq!(target.row_count("users"), 3);
    }

    #[tokio::test]
    async fn test_destination_without_columns_reads_only() {
        let source = FakeDatabase::new("src").with_table(FakeTable::users(7));
        let target = FakeDatabase::new("dst");

        let result = engine(&source, &target).copy_table("users", false).await.unwrap();

        assert_eq!(result, MigrationResult::migrated("users", 7, 7));
        assert!(target.upsert_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_source_count_is_error() {
        let source = FakeDatabase::new("src").with_table(FakeTable::users(7).failing_count());
        let target = FakeDatabase::new("dst").with_table(FakeTable::users(0));

        let result = engine(&source, &target).copy_table("users", false).await.unwrap();
        assert_eq!(
            result,
            MigrationResult::error("users", REASON_SOURCE_COUNT_UNAVAILABLE)
        );
    }

    #[tokio::test]
    async fn test_custom_batch_size() {
        let source = FakeDatabase::new("src").with_table(FakeTable::orders(10));
        let target = FakeDatabase::new("dst").with_table(FakeTable::orders(0));
        let copier = TransferEngine::new(&source, &target, TransferConfig { batch_size: 4 });

        copier.copy_table("orders", false).await.unwrap();
        assert_eq!(source.page_sizes(), vec![4, 4, 2]);
    }

    #[test]
    fn test_result_json_shape() {
        let skipped = serde_json::to_value(MigrationResult::skipped("orders", REASON_EMPTY_SOURCE))
            .unwrap();
        assert_eq!(
            skipped,
            serde_json::json!({
                "table": "orders",
                "status": "skipped",
                "reason": "empty_source",
                "processed": 0
            })
        );

        let migrated = serde_json::to_value(MigrationResult::migrated("users", 3, 3)).unwrap();
        assert_eq!(migrated["sourceCount"], 3);
        assert!(migrated.get("reason").is_none());
    }
}
