//! MySQL/MariaDB source reader implementation.
//!
//! Implements the `SourceReader` trait for reading data from MySQL/MariaDB databases.
//! Uses SQLx for async query execution over a single pooled connection.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::{Row, ValueRef};
use tracing::{debug, info, trace};

use super::dialect::MysqlDialect;
use crate::config::ConnectionSpec;
use crate::core::schema::ColumnMetadata;
use crate::core::traits::{CatalogReader, PageRequest, SourceReader};
use crate::core::value::{SourceRow, SqlValue};
use crate::error::{MigrateError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// MySQL/MariaDB source reader implementation.
pub struct MysqlReader {
    pool: MySqlPool,
    database: String,
    dialect: MysqlDialect,
}

impl MysqlReader {
    /// Connect to the source described by `spec`.
    ///
    /// The pool is capped at `max_conns`; concurrent callers queue for a
    /// connection instead of opening new ones.
    pub async fn new(spec: &ConnectionSpec, max_conns: u32) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&spec.host)
            .port(spec.port)
            .database(&spec.database)
            .username(&spec.user)
            .password(&spec.password)
            .ssl_mode(MySqlSslMode::Preferred);

        let pool = MySqlPoolOptions::new()
            .max_connections(max_conns.max(1))
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::pool(e, "creating MySQL source pool"))?;

        // Test connection
        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| MigrateError::pool(e, "testing MySQL source connection"))?;

        info!("Connected to MySQL source: {}", spec.display_name());

        Ok(Self {
            pool,
            database: spec.database.clone(),
            dialect: MysqlDialect::new(),
        })
    }

    /// Convert a MySQL row into a column-name keyed map.
    fn row_to_values(row: &MySqlRow, columns: &[ColumnMetadata]) -> SourceRow {
        columns
            .iter()
            .enumerate()
            .map(|(i, col)| (col.name.clone(), Self::decode_value(row, i, col)))
            .collect()
    }

    /// Decode one column based on its declared type.
    fn decode_value(row: &MySqlRow, idx: usize, col: &ColumnMetadata) -> SqlValue {
        let is_null: bool = row.try_get_raw(idx).map(|r| r.is_null()).unwrap_or(true);
        if is_null {
            return SqlValue::Null;
        }

        let decoded = match col.base_type() {
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint"
                if col.is_unsigned() =>
            {
                row.try_get::<u64, _>(idx).map(SqlValue::U64).ok()
            }
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" => {
                row.try_get::<i64, _>(idx).map(SqlValue::I64).ok()
            }

            "float" => row.try_get::<f32, _>(idx).map(SqlValue::F32).ok(),
            "double" | "real" => row.try_get::<f64, _>(idx).map(SqlValue::F64).ok(),
            "decimal" | "numeric" => row
                .try_get::<rust_decimal::Decimal, _>(idx)
                .map(SqlValue::Decimal)
                .ok(),

            "bit" | "boolean" | "bool" => row
                .try_get::<bool, _>(idx)
                .map(SqlValue::Bool)
                .or_else(|_| row.try_get::<u64, _>(idx).map(SqlValue::U64))
                .ok(),

            "binary" | "varbinary" | "blob" | "tinyblob" | "mediumblob" | "longblob" => row
                .try_get::<Vec<u8>, _>(idx)
                .map(SqlValue::Bytes)
                .ok(),

            "date" => row
                .try_get::<chrono::NaiveDate, _>(idx)
                .map(SqlValue::Date)
                .ok(),
            "time" => row
                .try_get::<chrono::NaiveTime, _>(idx)
                .map(SqlValue::Time)
                .ok(),
            "datetime" | "timestamp" => row
                .try_get::<chrono::NaiveDateTime, _>(idx)
                .map(SqlValue::DateTime)
                .ok(),

            "json" => row
                .try_get::<String, _>(idx)
                .map(SqlValue::Text)
                .or_else(|_| {
                    row.try_get::<serde_json::Value, _>(idx)
                        .map(|v| SqlValue::Text(v.to_string()))
                })
                .ok(),

            _ => row.try_get::<String, _>(idx).map(SqlValue::Text).ok(),
        };

        decoded.unwrap_or_else(|| Self::decode_fallback(row, idx, col))
    }

    /// Last resort for values the typed decoders reject (YEAR, zero dates, odd collations).
    fn decode_fallback(row: &MySqlRow, idx: usize, col: &ColumnMetadata) -> SqlValue {
        if let Ok(s) = row.try_get_unchecked::<String, _>(idx) {
            return SqlValue::Text(s);
        }
        if let Ok(bytes) = row.try_get_unchecked::<Vec<u8>, _>(idx) {
            return match String::from_utf8(bytes) {
                Ok(s) => SqlValue::Text(s),
                Err(e) => SqlValue::Bytes(e.into_bytes()),
            };
        }

        trace!(
            "Could not decode column {} ({}), reading as NULL",
            col.name,
            col.declared_type
        );
        SqlValue::Null
    }
}

#[async_trait]
impl CatalogReader for MysqlReader {
    fn database(&self) -> &str {
        &self.database
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        // CAST to CHAR to handle collation differences where information_schema
        // may return VARBINARY instead of VARCHAR
        let query = r#"
            SELECT CAST(TABLE_NAME AS CHAR(255)) AS TABLE_NAME
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(&self.database)
            .fetch_all(&self.pool)
            .await?;

        let tables = rows
            .iter()
            .map(|row| row.try_get::<String, _>("TABLE_NAME"))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!("Found {} tables in source '{}'", tables.len(), self.database);
        Ok(tables)
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let query = r#"
            SELECT COUNT(*) AS cnt FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
        "#;

        let row: MySqlRow = sqlx::query(query)
            .bind(&self.database)
            .bind(table)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get::<i64, _>("cnt")? > 0)
    }

    async fn exact_row_count(&self, table: &str) -> Result<i64> {
        let query = self.dialect.build_count_query(&self.database, table);

        let row: MySqlRow = sqlx::query(&query).fetch_one(&self.pool).await?;

        Ok(row.try_get::<i64, _>("cnt")?)
    }

    async fn estimated_row_count(&self, table: &str) -> Result<Option<i64>> {
        let query = r#"
            SELECT CAST(COALESCE(TABLE_ROWS, 0) AS SIGNED) AS table_rows
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
        "#;

        let row: Option<MySqlRow> = sqlx::query(query)
            .bind(&self.database)
            .bind(table)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get::<i64, _>("table_rows")?)),
            None => Ok(None),
        }
    }

    async fn load_columns(&self, table: &str) -> Result<Vec<ColumnMetadata>> {
        let query = r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
                CAST(COLUMN_TYPE AS CHAR(1024)) AS COLUMN_TYPE,
                CAST(CHARACTER_MAXIMUM_LENGTH AS UNSIGNED) AS max_length
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(&self.database)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("COLUMN_NAME")?;
            let declared: String = row.try_get("COLUMN_TYPE")?;
            let max_length: Option<u64> = row.try_get("max_length")?;
            columns.push(ColumnMetadata::new(name, &declared, max_length));
        }

        debug!("Loaded {} columns for source {}", columns.len(), table);
        Ok(columns)
    }

    async fn test_connection(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "testing MySQL source connection"))?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        debug!("Closed MySQL source connection");
    }
}

#[async_trait]
impl SourceReader for MysqlReader {
    async fn load_primary_key(&self, table: &str) -> Result<Vec<String>> {
        // CAST to CHAR to handle collation differences
        let query = r#"
            SELECT CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME
            FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND CONSTRAINT_NAME = 'PRIMARY'
            ORDER BY ORDINAL_POSITION
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(&self.database)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        let pk = rows
            .iter()
            .map(|row| row.try_get::<String, _>("COLUMN_NAME"))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(pk)
    }

    async fn read_page(&self, request: &PageRequest) -> Result<Vec<SourceRow>> {
        let names: Vec<String> = request.columns.iter().map(|c| c.name.clone()).collect();
        let query = self.dialect.build_page_query(
            &self.database,
            &request.table,
            &names,
            &request.order_by,
            request.limit,
            request.offset,
        );

        let rows: Vec<MySqlRow> = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                MigrateError::transfer(&request.table, format!("reading rows: {}", e))
            })?;

        trace!(
            "Read {} rows from {} at offset {}",
            rows.len(),
            request.table,
            request.offset
        );

        Ok(rows
            .iter()
            .map(|row| Self::row_to_values(row, &request.columns))
            .collect())
    }
}
