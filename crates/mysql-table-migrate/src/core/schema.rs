//! Column metadata read from the database catalog.
//!
//! Metadata is a snapshot taken when an operation starts; it is re-read on
//! every operation and never cached.

use serde::{Deserialize, Serialize};

/// One column of one table on one side of the migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetadata {
    /// Column name.
    pub name: String,

    /// Full declared type, lower-cased (e.g. `int(11) unsigned`, `varchar(255)`).
    pub declared_type: String,

    /// Maximum character length for string columns.
    pub max_length: Option<u64>,
}

impl ColumnMetadata {
    /// Create column metadata, lower-casing the declared type.
    pub fn new(name: impl Into<String>, declared_type: &str, max_length: Option<u64>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.trim().to_lowercase(),
            max_length,
        }
    }

    /// Base type without length, precision or modifiers (`varchar(255)` -> `varchar`).
    pub fn base_type(&self) -> &str {
        let end = self
            .declared_type
            .find(|c: char| c == '(' || c.is_whitespace())
            .unwrap_or(self.declared_type.len());
        &self.declared_type[..end]
    }

    /// Whether the column is declared UNSIGNED.
    pub fn is_unsigned(&self) -> bool {
        self.declared_type.contains("unsigned")
    }
}
