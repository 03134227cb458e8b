//! Knex migration bookkeeping on the destination.
//!
//! Purely informational: a destination managed by knex carries
//! `knex_migrations` and `knex_migrations_lock`, and a set lock flag usually
//! means a schema migration is running against it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::traits::TargetWriter;

pub const MIGRATIONS_TABLE: &str = "knex_migrations";
pub const MIGRATIONS_LOCK_TABLE: &str = "knex_migrations_lock";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationLockStatus {
    pub has_migrations_table: bool,
    pub has_lock_table: bool,
    /// `None` without a lock table, or when its first row is missing or unreadable.
    pub is_locked: Option<bool>,
}

/// Probe the destination. `None` when the catalog cannot be listed.
pub async fn probe<T>(destination: &T) -> Option<MigrationLockStatus>
where
    T: TargetWriter + ?Sized,
{
    let tables = match destination.list_tables().await {
        Ok(tables) => tables,
        Err(e) => {
            debug!("Migration lock probe failed: {}", e);
            return None;
        }
    };

    let has_migrations_table = tables.iter().any(|t| t == MIGRATIONS_TABLE);
    let has_lock_table = tables.iter().any(|t| t == MIGRATIONS_LOCK_TABLE);

    let is_locked = if has_lock_table {
        match destination.read_lock_flag(MIGRATIONS_LOCK_TABLE).await {
            Ok(flag) => flag,
            Err(e) => {
                debug!("Could not read {}: {}", MIGRATIONS_LOCK_TABLE, e);
                None
            }
        }
    } else {
        None
    };

    Some(MigrationLockStatus {
        has_migrations_table,
        has_lock_table,
        is_locked,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::ColumnMetadata;
    use crate::core::value::{SourceRow, SqlValue};
    use crate::testing::{FakeDatabase, FakeTable};

    fn lock_table(rows: Vec<SourceRow>) -> FakeTable {
        FakeTable::new(
            MIGRATIONS_LOCK_TABLE,
            vec![
                ColumnMetadata::new("index", "int(10) unsigned", None),
                ColumnMetadata::new("is_locked", "int(11)", None),
            ],
        )
        .with_rows(rows)
    }

    #[tokio::test]
    async fn test_no_knex_tables() {
        let db = FakeDatabase::new("dst");
        assert_eq!(
            probe(&db).await,
            Some(MigrationLockStatus {
                has_migrations_table: false,
                has_lock_table: false,
                is_locked: None,
            })
        );
    }

    #[tokio::test]
    async fn test_locked() {
        let db = FakeDatabase::new("dst")
            .with_table(FakeTable::new(MIGRATIONS_TABLE, Vec::new()))
            .with_table(lock_table(vec![SourceRow::from([(
                "is_locked".to_string(),
                SqlValue::I64(1),
            )])]));

        let status = probe(&db).await.unwrap();
        assert!(status.has_migrations_table);
        assert!(status.has_lock_table);
        assert_eq!(status.is_locked, Some(true));
    }

    #[tokio::test]
    async fn test_empty_lock_table() {
        let db = FakeDatabase::new("dst").with_table(lock_table(Vec::new()));
        let status = probe(&db).await.unwrap();
        assert_eq!(status.is_locked, None);
    }

    #[tokio::test]
    async fn test_catalog_failure() {
        let db = FakeDatabase::new("dst").failing_catalog();
        assert_eq!(probe(&db).await, None);
    }
}
