//! Database driver implementations.
//!
//! Each driver implements the core traits:
//! - `CatalogReader`: catalog and count queries
//! - `SourceReader`: paged row extraction
//! - `TargetWriter`: upserts and session settings
//!
//! Only MySQL/MariaDB is supported on either side.

pub mod mysql;

pub use mysql::{MysqlDialect, MysqlReader, MysqlWriter};
