//! Migration orchestrator - main workflow coordinator.
//!
//! Hosts the three operations: preview, migrate and table listing. The free
//! functions validate the connection specs, open a [`ConnectionPair`], run
//! the operation through an [`Orchestrator`] and release the connections on
//! every path.

pub mod lock;
pub mod pools;

pub use lock::MigrationLockStatus;
pub use pools::{health_check, ConnectionPair, HealthCheckResult};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::compare::{compare_tables, count_rows, TableComparison};
use crate::config::{
    validate_connection, validate_distinct, validate_preview_destination, ConnectionSpec,
    MigrationConfig, DEFAULT_BATCH_SIZE,
};
use crate::core::traits::{CatalogReader, SourceReader, TargetWriter};
use crate::drivers::MysqlWriter;
use crate::error::Result;
use crate::transfer::{MigrationResult, MigrationStatus, TransferConfig, TransferEngine};

/// Tables to compare. Empty means every source table.
#[derive(Debug, Clone, Default)]
pub struct PreviewRequest {
    pub tables: Vec<String>,
    pub approximate: bool,
}

/// Tables to migrate and how. Empty `tables` means every source table.
#[derive(Debug, Clone)]
pub struct MigrateRequest {
    pub tables: Vec<String>,
    pub disable_foreign_key_checks: bool,
    /// Per-table permission to merge into a non-empty destination. Absent means no.
    pub overwrite: HashMap<String, bool>,
    /// Grant overwrite to every table, including ones resolved from the source.
    pub overwrite_all: bool,
    pub batch_size: usize,
}

impl Default for MigrateRequest {
    fn default() -> Self {
        Self {
            tables: Vec::new(),
            disable_foreign_key_checks: false,
            overwrite: HashMap::new(),
            overwrite_all: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewReport {
    pub tables: Vec<TableComparison>,
    pub migration_lock: Option<MigrationLockStatus>,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    /// Unique run identifier.
    pub run_id: String,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    pub tables_migrated: usize,
    pub tables_skipped: usize,
    pub tables_failed: usize,

    /// Source rows read across all migrated tables.
    pub rows_processed: u64,

    /// One entry per requested table, in request order.
    pub results: Vec<MigrationResult>,
}

impl MigrationReport {
    fn new(run_id: String, started_at: DateTime<Utc>, results: Vec<MigrationResult>) -> Self {
        let completed_at = Utc::now();
        let count = |status: MigrationStatus| results.iter().filter(|r| r.status == status).count();

        Self {
            run_id,
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            tables_migrated: count(MigrationStatus::Migrated),
            tables_skipped: count(MigrationStatus::Skipped),
            tables_failed: count(MigrationStatus::Error),
            rows_processed: results.iter().map(|r| r.processed).sum(),
            results,
        }
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One row of the table listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSummary {
    pub table: String,

    /// Exact source row count, `-1` when the count failed.
    pub source_count: i64,

    /// Set only when a destination was given: `0` when absent, `-1` when the count failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_count: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exists_in_dest: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableListing {
    pub tables: Vec<TableSummary>,
    pub migration_lock: Option<MigrationLockStatus>,
}

/// Migration orchestrator over one source and one destination handle.
pub struct Orchestrator {
    source: Arc<dyn SourceReader>,
    destination: Arc<dyn TargetWriter>,
}

impl Orchestrator {
    /// Create an orchestrator over an open connection pair.
    pub fn new(pair: &ConnectionPair) -> Self {
        Self::from_parts(pair.source.clone(), pair.destination.clone())
    }

    /// Create an orchestrator over any reader and writer.
    pub fn from_parts(source: Arc<dyn SourceReader>, destination: Arc<dyn TargetWriter>) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// Compare every requested table and probe the destination's knex lock.
    pub async fn preview(&self, request: &PreviewRequest) -> Result<PreviewReport> {
        let requested = self.resolve_tables(&request.tables).await?;

        let (tables, migration_lock) = tokio::join!(
            compare_tables(
                &*self.source,
                &*self.destination,
                &requested,
                request.approximate
            ),
            lock::probe(&*self.destination),
        );

        Ok(PreviewReport {
            tables,
            migration_lock,
        })
    }

    /// Copy every requested table, one after another.
    ///
    /// A failing table yields an `error` result and the run continues. When
    /// foreign-key checks were disabled they are re-enabled on every path.
    pub async fn migrate(&self, request: &MigrateRequest) -> Result<MigrationReport> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!("Starting migration run {}", run_id);

        let outcome = self.run_tables(request).await;

        if request.disable_foreign_key_checks {
            if let Err(e) = self.destination.set_foreign_key_checks(true).await {
                warn!("Failed to re-enable foreign key checks: {}", e);
            }
        }

        let report = MigrationReport::new(run_id, started_at, outcome?);
        info!(
            "Migration run {} finished in {:.2}s: {} migrated, {} skipped, {} failed, {} rows processed",
            report.run_id,
            report.duration_seconds,
            report.tables_migrated,
            report.tables_skipped,
            report.tables_failed,
            report.rows_processed
        );
        Ok(report)
    }

    /// List source tables with counts, augmented with destination state.
    pub async fn fetch_tables(&self) -> Result<TableListing> {
        list_tables(&*self.source, Some(&*self.destination)).await
    }

    async fn run_tables(&self, request: &MigrateRequest) -> Result<Vec<MigrationResult>> {
        if request.disable_foreign_key_checks {
            self.destination.set_foreign_key_checks(false).await?;
        }

        let tables = self.resolve_tables(&request.tables).await?;
        let engine = TransferEngine::new(
            &*self.source,
            &*self.destination,
            TransferConfig {
                batch_size: request.batch_size.max(1),
            },
        );

        let mut results = Vec::with_capacity(tables.len());
        for table in &tables {
            let overwrite =
                request.overwrite_all || request.overwrite.get(table).copied().unwrap_or(false);

            let result = match engine.copy_table(table, overwrite).await {
                Ok(result) => result,
                Err(e) => {
                    error!("Migration failed for {}: {}", table, e);
                    MigrationResult::error(table, e.to_string())
                }
            };
            results.push(result);
        }

        Ok(results)
    }

    async fn resolve_tables(&self, requested: &[String]) -> Result<Vec<String>> {
        if requested.is_empty() {
            self.source.list_tables().await
        } else {
            Ok(requested.to_vec())
        }
    }
}

/// Source tables with exact counts; destination existence and counts when given.
pub async fn list_tables<S, D>(source: &S, destination: Option<&D>) -> Result<TableListing>
where
    S: SourceReader + ?Sized,
    D: TargetWriter + ?Sized,
{
    let names = source.list_tables().await?;

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        let source_count = count_rows(source, &name, false).await;
        tables.push(TableSummary {
            table: name,
            source_count,
            dest_count: None,
            exists_in_dest: None,
        });
    }

    let Some(destination) = destination else {
        return Ok(TableListing {
            tables,
            migration_lock: None,
        });
    };

    let dest_tables = destination.list_tables().await?;
    for summary in &mut tables {
        if dest_tables.contains(&summary.table) {
            summary.exists_in_dest = Some(true);
            summary.dest_count = Some(count_rows(destination, &summary.table, false).await);
        } else {
            summary.exists_in_dest = Some(false);
            summary.dest_count = Some(0);
        }
    }

    Ok(TableListing {
        tables,
        migration_lock: lock::probe(destination).await,
    })
}

/// Read-only comparison. The destination must be on the local machine.
pub async fn preview(
    source: &ConnectionSpec,
    destination: &ConnectionSpec,
    request: &PreviewRequest,
) -> Result<PreviewReport> {
    validate_connection("source", source)?;
    validate_connection("destination", destination)?;
    validate_preview_destination(destination)?;

    let pair = ConnectionPair::connect(source, destination).await?;
    let result = Orchestrator::new(&pair).preview(request).await;
    pair.close().await;
    result
}

/// Copy the requested tables. Rejected before connecting when both specs name
/// the same database.
pub async fn migrate(
    source: &ConnectionSpec,
    destination: &ConnectionSpec,
    request: &MigrateRequest,
) -> Result<MigrationReport> {
    validate_connection("source", source)?;
    validate_connection("destination", destination)?;
    validate_distinct(source, destination)?;

    let pair = ConnectionPair::connect(source, destination).await?;
    let result = Orchestrator::new(&pair).migrate(request).await;
    pair.close().await;
    result
}

/// List source tables, optionally augmented with destination state.
pub async fn fetch_tables(
    source: &ConnectionSpec,
    destination: Option<&ConnectionSpec>,
) -> Result<TableListing> {
    validate_connection("source", source)?;

    match destination {
        Some(destination) => {
            validate_connection("destination", destination)?;
            let pair = ConnectionPair::connect(source, destination).await?;
            let result = Orchestrator::new(&pair).fetch_tables().await;
            pair.close().await;
            result
        }
        None => {
            let reader = pools::connect_source(source).await?;
            let result = list_tables(&reader, None::<&MysqlWriter>).await;
            reader.close().await;
            result
        }
    }
}

impl From<&MigrationConfig> for MigrateRequest {
    fn from(config: &MigrationConfig) -> Self {
        Self {
            tables: config.tables.clone(),
            disable_foreign_key_checks: config.disable_foreign_key_checks,
            overwrite: config.overwrite.clone(),
            overwrite_all: config.overwrite_all,
            batch_size: config.get_batch_size(),
        }
    }
}

impl From<&MigrationConfig> for PreviewRequest {
    fn from(config: &MigrationConfig) -> Self {
        Self {
            tables: config.tables.clone(),
            approximate: config.approximate_counts,
        }
    }
}
