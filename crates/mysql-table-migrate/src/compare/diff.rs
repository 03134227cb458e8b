//! Column-level schema comparison between source and destination.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::schema::ColumnMetadata;

/// A column whose declared type differs between the two sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMismatch {
    pub column: String,
    pub src_type: String,
    pub dest_type: String,
}

/// Differences between a source table's columns and its destination counterpart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDiff {
    /// Source columns with no destination column of the same name.
    pub missing_in_dest: Vec<String>,

    /// Destination columns with no source column of the same name.
    pub extra_in_dest: Vec<String>,

    /// Columns present on both sides with different declared types.
    pub type_mismatches: Vec<TypeMismatch>,
}

impl SchemaDiff {
    /// Compute the diff. Lists follow each side's ordinal order.
    ///
    /// Types are compared as lower-cased `COLUMN_TYPE` text, so `int(11)` and
    /// `int(10) unsigned` differ.
    pub fn between(source: &[ColumnMetadata], dest: &[ColumnMetadata]) -> Self {
        let dest_types: HashMap<&str, &str> = dest
            .iter()
            .map(|c| (c.name.as_str(), c.declared_type.as_str()))
            .collect();

        let mut diff = SchemaDiff::default();

        for col in source {
            match dest_types.get(col.name.as_str()) {
                None => diff.missing_in_dest.push(col.name.clone()),
                Some(dest_type) if *dest_type != col.declared_type => {
                    diff.type_mismatches.push(TypeMismatch {
                        column: col.name.clone(),
                        src_type: col.declared_type.clone(),
                        dest_type: (*dest_type).to_string(),
                    });
                }
                Some(_) => {}
            }
        }

        diff.extra_in_dest = dest
            .iter()
            .filter(|d| !source.iter().any(|s| s.name == d.name))
            .map(|d| d.name.clone())
            .collect();

        diff
    }

    /// Whether the destination cannot hold the source rows as-is.
    ///
    /// Extra destination columns alone do not block a copy.
    pub fn is_blocking(&self) -> bool {
        !self.missing_in_dest.is_empty() || !self.type_mismatches.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.is_blocking() && self.extra_in_dest.is_empty()
    }
}
