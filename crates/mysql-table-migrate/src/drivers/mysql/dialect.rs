//! MySQL/MariaDB SQL dialect.
//!
//! Identifier quoting and the handful of statements the reader and writer
//! build dynamically. Values are always bound as parameters; only integers
//! (LIMIT/OFFSET) are inlined.

/// MySQL max placeholders per prepared statement.
pub const MYSQL_MAX_PLACEHOLDERS: usize = 65_535;

/// MySQL/MariaDB dialect implementation.
///
/// Compatible with MySQL 5.7+, 8.0+, and MariaDB 10.2+.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Create a new MySQL dialect instance.
    pub fn new() -> Self {
        Self
    }

    /// Quote an identifier with backticks, doubling embedded backticks.
    pub fn quote_ident(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    /// Qualify a table name with its database.
    pub fn qualify(&self, schema: &str, table: &str) -> String {
        format!("{}.{}", self.quote_ident(schema), self.quote_ident(table))
    }

    pub fn build_count_query(&self, schema: &str, table: &str) -> String {
        format!("SELECT COUNT(*) AS cnt FROM {}", self.qualify(schema, table))
    }

    /// Offset-paginated SELECT of the given columns.
    pub fn build_page_query(
        &self,
        schema: &str,
        table: &str,
        columns: &[String],
        order_by: &[String],
        limit: usize,
        offset: u64,
    ) -> String {
        let cols = if columns.is_empty() {
            "*".to_string()
        } else {
            columns
                .iter()
                .map(|c| self.quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", cols, self.qualify(schema, table));

        if !order_by.is_empty() {
            let order = order_by
                .iter()
                .map(|c| self.quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" ORDER BY {}", order));
        }

        sql.push_str(&format!(" LIMIT {}", limit));
        if offset > 0 {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        sql
    }

    /// Multi-row `INSERT ... ON DUPLICATE KEY UPDATE` with `?` placeholders.
    ///
    /// Every inserted column is merged on conflict, so the destination's own
    /// primary and unique keys decide which rows collide.
    pub fn build_upsert_query(
        &self,
        schema: &str,
        table: &str,
        columns: &[String],
        row_count: usize,
    ) -> String {
        let col_list = columns
            .iter()
            .map(|c| self.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");

        let row_placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
        let values = vec![row_placeholders; row_count].join(", ");

        let update_set = columns
            .iter()
            .map(|c| {
                let quoted = self.quote_ident(c);
                format!("{} = VALUES({})", quoted, quoted)
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "INSERT INTO {} ({}) VALUES {} ON DUPLICATE KEY UPDATE {}",
            self.qualify(schema, table),
            col_list,
            values,
            update_set
        )
    }

    /// Largest number of rows per statement for `num_cols` columns.
    pub fn max_rows_per_statement(&self, num_cols: usize) -> usize {
        if num_cols == 0 {
            0
        } else {
            (MYSQL_MAX_PLACEHOLDERS / num_cols).max(1)
        }
    }

    pub fn foreign_key_checks_sql(&self, enabled: bool) -> &'static str {
        if enabled {
            "SET FOREIGN_KEY_CHECKS = 1"
        } else {
            "SET FOREIGN_KEY_CHECKS = 0"
        }
    }
}
