//! # mysql-table-migrate
//!
//! Table data migration between MySQL/MariaDB databases.
//!
//! This library provides:
//!
//! - **Preview**: per-table readiness (`ready`, `missing`, `mismatch`, `empty`,
//!   `unknown`) from row counts and column diffs, without writing anything
//! - **Migrate**: paginated copy with type coercion, upsert merging and
//!   row-by-row fallback when a batch is rejected
//! - **Foreign-key toggle** for the whole run, always restored
//! - **Table listing** with optional destination state and knex lock status
//!
//! ## Example
//!
//! ```rust,no_run
//! use mysql_table_migrate::{orchestrator, Config, MigrateRequest};
//!
//! #[tokio::main]
//! async fn main() -> mysql_table_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let request = MigrateRequest::from(&config.migration);
//!     let report = orchestrator::migrate(&config.source, &config.destination, &request).await?;
//!     println!("Processed {} rows", report.rows_processed);
//!     Ok(())
//! }
//! ```

pub mod compare;
pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod transfer;
pub mod transform;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use compare::{ComparisonStatus, SchemaDiff, TableComparison, TypeMismatch};
pub use config::{Config, ConnectionSpec, MigrationConfig};
pub use error::{MigrateError, Result};
pub use orchestrator::{
    ConnectionPair, HealthCheckResult, MigrateRequest, MigrationLockStatus, MigrationReport,
    Orchestrator, PreviewReport, PreviewRequest, TableListing, TableSummary,
};
pub use transfer::{MigrationResult, MigrationStatus, TransferConfig, TransferEngine};
