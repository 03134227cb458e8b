//! In-memory databases for engine tests.
//!
//! `FakeDatabase` implements both `SourceReader` and `TargetWriter`, so the
//! same type stands in for either side of a migration.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::core::schema::ColumnMetadata;
use crate::core::traits::{CatalogReader, PageRequest, SourceReader, TargetWriter};
use crate::core::value::{SourceRow, SqlValue};
use crate::error::{MigrateError, Result};

#[derive(Debug, Clone)]
pub struct FakeTable {
    pub name: String,
    pub columns: Vec<ColumnMetadata>,
    pub primary_key: Vec<String>,
    pub rows: Vec<SourceRow>,
    estimate: Option<Option<i64>>,
    fail_count: bool,
    fail_columns: bool,
    fail_bulk: bool,
    reject_ids: HashSet<i64>,
}

impl FakeTable {
    pub fn new(name: &str, columns: Vec<ColumnMetadata>) -> Self {
        Self {
            name: name.to_string(),
            columns,
            primary_key: Vec::new(),
            rows: Vec::new(),
            estimate: None,
            fail_count: false,
            fail_columns: false,
            fail_bulk: false,
            reject_ids: HashSet::new(),
        }
    }

    /// `users(id, email, created_at)` with `n` rows and `id` as primary key.
    pub fn users(n: i64) -> Self {
        let created = NaiveDate::from_ymd_opt(2024, 1, 15)
            .and_then(|d| d.and_hms_opt(10, 30, 0))
            .expect("valid timestamp");

        let rows = (1..=n)
            .map(|id| {
                SourceRow::from([
                    ("id".to_string(), SqlValue::I64(id)),
                    ("email".to_string(), SqlValue::Text(format!("user{}@example.com", id))),
                    ("created_at".to_string(), SqlValue::DateTime(created)),
                ])
            })
            .collect();

        Self::new(
            "users",
            vec![
                ColumnMetadata::new("id", "int(11)", None),
                ColumnMetadata::new("email", "varchar(255)", Some(255)),
                ColumnMetadata::new("created_at", "datetime", None),
            ],
        )
        .with_primary_key(&["id"])
        .with_rows(rows)
    }

    /// `orders(id, total)` with `n` rows and `id` as primary key.
    pub fn orders(n: i64) -> Self {
        let rows = (1..=n)
            .map(|id| {
                SourceRow::from([
                    ("id".to_string(), SqlValue::I64(id)),
                    ("total".to_string(), SqlValue::Text(format!("{}.50", id))),
                ])
            })
            .collect();

        Self::new(
            "orders",
            vec![
                ColumnMetadata::new("id", "int(11)", None),
                ColumnMetadata::new("total", "decimal(10,2)", None),
            ],
        )
        .with_primary_key(&["id"])
        .with_rows(rows)
    }

    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_rows(mut self, rows: Vec<SourceRow>) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_estimate(mut self, estimate: Option<i64>) -> Self {
        self.estimate = Some(estimate);
        self
    }

    pub fn failing_count(mut self) -> Self {
        self.fail_count = true;
        self
    }

    pub fn failing_columns(mut self) -> Self {
        self.fail_columns = true;
        self
    }

    /// Multi-row upserts fail; single-row upserts succeed.
    pub fn failing_bulk(mut self) -> Self {
        self.fail_bulk = true;
        self
    }

    /// Any upsert containing a row with this `id` fails.
    pub fn rejecting_id(mut self, id: i64) -> Self {
        self.reject_ids.insert(id);
        self
    }

    fn key_of(&self, row: &SourceRow) -> Option<Vec<SqlValue>> {
        if self.primary_key.is_empty() {
            return None;
        }
        Some(
            self.primary_key
                .iter()
                .map(|k| row.get(k).cloned().unwrap_or(SqlValue::Null))
                .collect(),
        )
    }
}

#[derive(Debug, Default)]
pub struct FakeDatabase {
    name: String,
    tables: Mutex<BTreeMap<String, FakeTable>>,
    fk_log: Mutex<Vec<bool>>,
    upserts: Mutex<Vec<usize>>,
    pages: Mutex<Vec<usize>>,
    fail_fk: bool,
    fail_catalog: bool,
    closed: AtomicBool,
}

impl FakeDatabase {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_table(self, table: FakeTable) -> Self {
        self.tables
            .lock()
            .expect("lock")
            .insert(table.name.clone(), table);
        self
    }

    /// `SET FOREIGN_KEY_CHECKS` fails.
    pub fn failing_foreign_key_toggle(mut self) -> Self {
        self.fail_fk = true;
        self
    }

    /// Catalog listing and existence probes fail.
    pub fn failing_catalog(mut self) -> Self {
        self.fail_catalog = true;
        self
    }

    pub fn rows(&self, table: &str) -> Vec<SourceRow> {
        self.tables
            .lock()
            .expect("lock")
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.rows(table).len()
    }

    /// Every foreign-key toggle, in call order.
    pub fn fk_log(&self) -> Vec<bool> {
        self.fk_log.lock().expect("lock").clone()
    }

    /// Size of every successful upsert call, in call order.
    pub fn upsert_sizes(&self) -> Vec<usize> {
        self.upserts.lock().expect("lock").clone()
    }

    /// Size of every page returned by `read_page`, in call order.
    pub fn page_sizes(&self) -> Vec<usize> {
        self.pages.lock().expect("lock").clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn missing(&self, table: &str) -> MigrateError {
        MigrateError::transfer(table, format!("table {}.{} doesn't exist", self.name, table))
    }
}

#[async_trait]
impl CatalogReader for FakeDatabase {
    fn database(&self) -> &str {
        &self.name
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        if self.fail_catalog {
            return Err(MigrateError::pool("catalog unavailable", "listing tables"));
        }
        Ok(self.tables.lock().expect("lock").keys().cloned().collect())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        if self.fail_catalog {
            return Err(MigrateError::pool("catalog unavailable", "checking table"));
        }
        Ok(self.tables.lock().expect("lock").contains_key(table))
    }

    async fn exact_row_count(&self, table: &str) -> Result<i64> {
        let tables = self.tables.lock().expect("lock");
        match tables.get(table) {
            Some(t) if t.fail_count => Err(MigrateError::transfer(table, "count timed out")),
            Some(t) => Ok(t.rows.len() as i64),
            None => Err(self.missing(table)),
        }
    }

    async fn estimated_row_count(&self, table: &str) -> Result<Option<i64>> {
        let tables = self.tables.lock().expect("lock");
        Ok(tables
            .get(table)
            .and_then(|t| t.estimate.unwrap_or(Some(t.rows.len() as i64))))
    }

    async fn load_columns(&self, table: &str) -> Result<Vec<ColumnMetadata>> {
        let tables = self.tables.lock().expect("lock");
        match tables.get(table) {
            Some(t) if t.fail_columns => Err(MigrateError::transfer(table, "columns unavailable")),
            Some(t) => Ok(t.columns.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn test_connection(&self) -> Result<()> {
        if self.is_closed() {
            return Err(MigrateError::pool("connection already closed", "fake"));
        }
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SourceReader for FakeDatabase {
    async fn load_primary_key(&self, table: &str) -> Result<Vec<String>> {
        let tables = self.tables.lock().expect("lock");
        Ok(tables
            .get(table)
            .map(|t| t.primary_key.clone())
            .unwrap_or_default())
    }

    async fn read_page(&self, request: &PageRequest) -> Result<Vec<SourceRow>> {
        let tables = self.tables.lock().expect("lock");
        let table = tables
            .get(&request.table)
            .ok_or_else(|| self.missing(&request.table))?;

        let page: Vec<SourceRow> = table
            .rows
            .iter()
            .skip(request.offset as usize)
            .take(request.limit)
            .cloned()
            .collect();

        self.pages.lock().expect("lock").push(page.len());
        Ok(page)
    }
}

#[async_trait]
impl TargetWriter for FakeDatabase {
    async fn upsert_rows(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<SqlValue>],
    ) -> Result<u64> {
        let mut tables = self.tables.lock().expect("lock");
        let target = tables.get_mut(table).ok_or_else(|| self.missing(table))?;

        if target.fail_bulk && rows.len() > 1 {
            return Err(MigrateError::transfer(table, "packet too large"));
        }

        let incoming: Vec<SourceRow> = rows
            .iter()
            .map(|values| columns.iter().cloned().zip(values.iter().cloned()).collect())
            .collect();

        let rejected = incoming.iter().any(|row| {
            matches!(row.get("id"), Some(SqlValue::I64(id)) if target.reject_ids.contains(id))
        });
        if rejected {
            return Err(MigrateError::transfer(table, "duplicate entry for unique key"));
        }

        for row in incoming {
            let key = target.key_of(&row);
            let existing = key.as_ref().and_then(|k| {
                target
                    .rows
                    .iter()
                    .position(|r| target.key_of(r).as_ref() == Some(k))
            });
            match existing {
                Some(idx) => target.rows[idx].extend(row),
                None => target.rows.push(row),
            }
        }

        self.upserts.lock().expect("lock").push(rows.len());
        Ok(rows.len() as u64)
    }

    async fn set_foreign_key_checks(&self, enabled: bool) -> Result<()> {
        self.fk_log.lock().expect("lock").push(enabled);
        if self.fail_fk {
            return Err(MigrateError::pool("SET FOREIGN_KEY_CHECKS failed", "fake"));
        }
        Ok(())
    }

    async fn read_lock_flag(&self, lock_table: &str) -> Result<Option<bool>> {
        let tables = self.tables.lock().expect("lock");
        let table = tables.get(lock_table).ok_or_else(|| self.missing(lock_table))?;
        Ok(table.rows.first().and_then(|row| match row.get("is_locked") {
            Some(SqlValue::I64(v)) => Some(*v != 0),
            Some(SqlValue::Bool(b)) => Some(*b),
            _ => None,
        }))
    }
}
