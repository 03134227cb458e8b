//! Core abstractions shared by the drivers and the migration engine.
//!
//! - [`schema`]: column metadata read from the catalog
//! - [`value`]: SQL value representation for extracted rows
//! - [`traits`]: reader and writer traits implemented by the drivers

pub mod schema;
pub mod traits;
pub mod value;

pub use schema::ColumnMetadata;
pub use traits::{CatalogReader, PageRequest, SourceReader, TargetWriter};
pub use value::{SourceRow, SqlValue};
