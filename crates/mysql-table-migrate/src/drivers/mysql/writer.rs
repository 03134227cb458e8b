//! MySQL/MariaDB target writer implementation.
//!
//! Implements the `TargetWriter` trait for writing data to MySQL/MariaDB databases.
//! Uses mysql_async over one dedicated connection: `FOREIGN_KEY_CHECKS` is
//! session state, so the toggle and every upsert must share a session.

use async_trait::async_trait;
use chrono::{Datelike, Timelike};
use mysql_async::prelude::*;
use mysql_async::{Conn, OptsBuilder, SslOpts};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::dialect::MysqlDialect;
use crate::config::ConnectionSpec;
use crate::core::schema::ColumnMetadata;
use crate::core::traits::{CatalogReader, TargetWriter};
use crate::core::value::SqlValue;
use crate::error::{MigrateError, Result};

/// MySQL target writer implementation using mysql_async.
pub struct MysqlWriter {
    conn: Mutex<Option<Conn>>,
    database: String,
    dialect: MysqlDialect,
}

impl MysqlWriter {
    /// Open the destination session described by `spec`.
    pub async fn new(spec: &ConnectionSpec) -> Result<Self> {
        let mut builder = OptsBuilder::default()
            .ip_or_hostname(&spec.host)
            .tcp_port(spec.port)
            .db_name(Some(&spec.database))
            .user(Some(&spec.user))
            .pass(Some(&spec.password))
            // Use utf8mb4 for full Unicode support
            .init(vec!["SET NAMES utf8mb4"]);

        if !spec.is_loopback() {
            builder = builder.ssl_opts(SslOpts::default().with_danger_accept_invalid_certs(true));
        }

        let mut conn = Conn::new(builder)
            .await
            .map_err(|e| MigrateError::pool(e, "opening MySQL destination connection"))?;

        // Test connection
        conn.query_drop("SELECT 1")
            .await
            .map_err(|e| MigrateError::pool(e, "testing MySQL destination connection"))?;

        info!("Connected to MySQL destination: {}", spec.display_name());

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            database: spec.database.clone(),
            dialect: MysqlDialect::new(),
        })
    }

    /// Borrow the live connection out of the guard.
    fn live(slot: &mut Option<Conn>) -> Result<&mut Conn> {
        slot.as_mut()
            .ok_or_else(|| MigrateError::pool("connection already closed", "MySQL destination"))
    }
}

#[async_trait]
impl CatalogReader for MysqlWriter {
    fn database(&self) -> &str {
        &self.database
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let query = r#"
            SELECT CAST(TABLE_NAME AS CHAR(255))
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;

        let mut guard = self.conn.lock().await;
        let conn = Self::live(&mut guard)?;
        let tables: Vec<String> = conn.exec(query, (self.database.as_str(),)).await?;

        debug!(
            "Found {} tables in destination '{}'",
            tables.len(),
            self.database
        );
        Ok(tables)
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let query = r#"
            SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
        "#;

        let mut guard = self.conn.lock().await;
        let conn = Self::live(&mut guard)?;
        let count: Option<i64> = conn
            .exec_first(query, (self.database.as_str(), table))
            .await?;

        Ok(count.unwrap_or(0) > 0)
    }

    async fn exact_row_count(&self, table: &str) -> Result<i64> {
        let query = self.dialect.build_count_query(&self.database, table);

        let mut guard = self.conn.lock().await;
        let conn = Self::live(&mut guard)?;
        let count: Option<i64> = conn.query_first(query).await?;

        Ok(count.unwrap_or(0))
    }

    async fn estimated_row_count(&self, table: &str) -> Result<Option<i64>> {
        let query = r#"
            SELECT CAST(COALESCE(TABLE_ROWS, 0) AS SIGNED)
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
        "#;

        let mut guard = self.conn.lock().await;
        let conn = Self::live(&mut guard)?;
        let rows: Option<i64> = conn
            .exec_first(query, (self.database.as_str(), table))
            .await?;

        Ok(rows)
    }

    async fn load_columns(&self, table: &str) -> Result<Vec<ColumnMetadata>> {
        let query = r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR(255)),
                CAST(COLUMN_TYPE AS CHAR(1024)),
                CAST(CHARACTER_MAXIMUM_LENGTH AS UNSIGNED)
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let mut guard = self.conn.lock().await;
        let conn = Self::live(&mut guard)?;
        let rows: Vec<(String, String, Option<u64>)> = conn
            .exec(query, (self.database.as_str(), table))
            .await?;

        let columns: Vec<ColumnMetadata> = rows
            .into_iter()
            .map(|(name, declared, max_length)| ColumnMetadata::new(name, &declared, max_length))
            .collect();

        debug!("Loaded {} columns for destination {}", columns.len(), table);
        Ok(columns)
    }

    async fn test_connection(&self) -> Result<()> {
        let mut guard = self.conn.lock().await;
        let conn = Self::live(&mut guard)?;
        conn.query_drop("SELECT 1")
            .await
            .map_err(|e| MigrateError::pool(e, "testing MySQL destination connection"))?;
        Ok(())
    }

    async fn close(&self) {
        let conn = self.conn.lock().await.take();
        if let Some(conn) = conn {
            if let Err(e) = conn.disconnect().await {
                debug!("Error closing MySQL destination connection: {}", e);
            } else {
                debug!("Closed MySQL destination connection");
            }
        }
    }
}

#[async_trait]
impl TargetWriter for MysqlWriter {
    async fn upsert_rows(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<SqlValue>],
    ) -> Result<u64> {
        if rows.is_empty() || columns.is_empty() {
            return Ok(0);
        }

        let rows_per_stmt = self.dialect.max_rows_per_statement(columns.len());

        let mut guard = self.conn.lock().await;
        let conn = Self::live(&mut guard)?;

        for chunk in rows.chunks(rows_per_stmt) {
            let sql = self
                .dialect
                .build_upsert_query(&self.database, table, columns, chunk.len());

            let params: Vec<mysql_async::Value> = chunk
                .iter()
                .flat_map(|row| row.iter().map(sql_value_to_mysql))
                .collect();

            conn.exec_drop(&sql, params).await?;
        }

        debug!("MySQL: upserted {} rows to {}", rows.len(), table);
        Ok(rows.len() as u64)
    }

    async fn set_foreign_key_checks(&self, enabled: bool) -> Result<()> {
        let mut guard = self.conn.lock().await;
        let conn = Self::live(&mut guard)?;
        conn.query_drop(self.dialect.foreign_key_checks_sql(enabled))
            .await?;

        if enabled {
            debug!("Foreign key checks restored on destination");
        } else {
            warn!("Foreign key checks disabled on destination for this session");
        }
        Ok(())
    }

    async fn read_lock_flag(&self, lock_table: &str) -> Result<Option<bool>> {
        let query = format!(
            "SELECT CAST(is_locked AS SIGNED) FROM {} LIMIT 1",
            self.dialect.qualify(&self.database, lock_table)
        );

        let mut guard = self.conn.lock().await;
        let conn = Self::live(&mut guard)?;
        let flag: Option<Option<i64>> = conn.query_first(query).await?;

        Ok(flag.flatten().map(|v| v != 0))
    }
}

/// Convert SqlValue to mysql_async::Value.
fn sql_value_to_mysql(value: &SqlValue) -> mysql_async::Value {
    use mysql_async::Value;

    match value {
        SqlValue::Null => Value::NULL,
        SqlValue::Bool(b) => Value::Int(i64::from(*b)),
        SqlValue::I64(i) => Value::Int(*i),
        SqlValue::U64(u) => Value::UInt(*u),
        SqlValue::F32(f) => Value::Float(*f),
        SqlValue::F64(f) => Value::Double(*f),
        SqlValue::Decimal(d) => Value::Bytes(d.to_string().into_bytes()),
        SqlValue::Text(s) => Value::Bytes(s.as_bytes().to_vec()),
        SqlValue::Bytes(b) => Value::Bytes(b.clone()),
        SqlValue::Date(d) => Value::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0),
        SqlValue::Time(t) => Value::Time(
            false,
            0,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            t.nanosecond() / 1_000,
        ),
        SqlValue::DateTime(dt) => Value::Date(
            dt.year() as u16,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
            dt.nanosecond() / 1_000,
        ),
    }
}
