//! SQL value types for row transfer.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

/// One row extracted from the source, keyed by column name.
pub type SourceRow = HashMap<String, SqlValue>;

/// SQL value enum for type-safe row handling.
///
/// Values are owned: a page of rows lives only until its batch is written.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer of any width.
    I64(i64),

    /// Unsigned integer of any width.
    U64(u64),

    /// Single precision float.
    F32(f32),

    /// Double precision float.
    F64(f64),

    /// Exact decimal.
    Decimal(Decimal),

    /// Text data.
    Text(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// Date without time.
    Date(NaiveDate),

    /// Time of day.
    Time(NaiveTime),

    /// Date and time without zone.
    DateTime(NaiveDateTime),
}

impl SqlValue {
    /// Borrow the string payload of a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to a JSON value.
    ///
    /// Returns `None` when the value has no JSON representation
    /// (non-finite floats, bytes that are not UTF-8).
    pub fn to_json(&self) -> Option<serde_json::Value> {
        use serde_json::Value;

        match self {
            SqlValue::Null => Some(Value::Null),
            SqlValue::Bool(b) => Some(Value::Bool(*b)),
            SqlValue::I64(i) => Some(Value::from(*i)),
            SqlValue::U64(u) => Some(Value::from(*u)),
            SqlValue::F32(f) => serde_json::Number::from_f64(f64::from(*f)).map(Value::Number),
            SqlValue::F64(f) => serde_json::Number::from_f64(*f).map(Value::Number),
            SqlValue::Decimal(d) => Some(Value::String(d.to_string())),
            SqlValue::Text(s) => Some(Value::String(s.clone())),
            SqlValue::Bytes(b) => std::str::from_utf8(b)
                .ok()
                .map(|s| Value::String(s.to_string())),
            SqlValue::Date(d) => Some(Value::String(d.format("%Y-%m-%d").to_string())),
            SqlValue::Time(t) => Some(Value::String(t.format("%H:%M:%S").to_string())),
            SqlValue::DateTime(dt) => {
                Some(Value::String(dt.format("%Y-%m-%d %H:%M:%S").to_string()))
            }
        }
    }

    /// Short type label for logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::I64(_) => "i64",
            SqlValue::U64(_) => "u64",
            SqlValue::F32(_) => "f32",
            SqlValue::F64(_) => "f64",
            SqlValue::Decimal(_) => "decimal",
            SqlValue::Text(_) => "text",
            SqlValue::Bytes(_) => "bytes",
            SqlValue::Date(_) => "date",
            SqlValue::Time(_) => "time",
            SqlValue::DateTime(_) => "datetime",
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}
