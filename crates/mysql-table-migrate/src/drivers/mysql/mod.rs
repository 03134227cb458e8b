//! MySQL/MariaDB database driver.
//!
//! This module provides MySQL-specific implementations for:
//! - [`MysqlDialect`]: SQL text for counts, pages and upserts
//! - [`MysqlReader`]: Source database reader (SQLx)
//! - [`MysqlWriter`]: Destination database writer (mysql_async)
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+

mod dialect;
mod reader;
mod writer;

pub use dialect::{MysqlDialect, MYSQL_MAX_PLACEHOLDERS};
pub use reader::MysqlReader;
pub use writer::MysqlWriter;
