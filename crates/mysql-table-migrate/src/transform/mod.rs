//! Row coercion from source values to destination column kinds.
//!
//! Each destination column is classified once into a [`ColumnKind`]; every
//! source row is then mapped onto the destination column list, or rejected
//! as a whole when a value cannot be represented.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::core::schema::ColumnMetadata;
use crate::core::value::{SourceRow, SqlValue};

/// Strings longer than this (in characters) reject the row.
pub const MAX_STRING_CHARS: usize = 500_000;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TIME_FORMAT: &str = "%H:%M:%S";

/// Coercion strategy for a destination column, derived from its declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Temporal,
    Json,
    Numeric,
    Text,
    Other,
}

impl ColumnKind {
    /// Classify a declared type. The first matching rule wins.
    ///
    /// Parenthesized arguments are ignored so enum members and lengths never
    /// influence the kind.
    pub fn classify(declared_type: &str) -> Self {
        let t = strip_type_args(&declared_type.to_ascii_lowercase());
        let has = |needle: &str| t.contains(needle);

        if has("date") || has("time") {
            ColumnKind::Temporal
        } else if has("json") {
            ColumnKind::Json
        } else if has("int")
            || has("decimal")
            || has("float")
            || has("double")
            || has("real")
            || has("numeric")
        {
            ColumnKind::Numeric
        } else if has("char") || has("text") || has("enum") || has("set") {
            ColumnKind::Text
        } else {
            ColumnKind::Other
        }
    }
}

/// `enum('a','b') not null` -> `enum not null`.
fn strip_type_args(declared_type: &str) -> String {
    let mut out = String::with_capacity(declared_type.len());
    let mut depth = 0usize;
    for c in declared_type.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Why a row was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowRejection {
    #[error("column {column}: '{value}' is not a valid date/time")]
    InvalidTemporal { column: String, value: String },

    #[error("column {column}: value of {chars} characters exceeds the 500000 character limit")]
    Oversized { column: String, chars: usize },
}

#[derive(Debug, Clone)]
struct ColumnPlan {
    name: String,
    kind: ColumnKind,
    max_length: Option<usize>,
}

/// Maps source rows onto a destination table's columns.
#[derive(Debug, Clone)]
pub struct RowTransformer {
    columns: Vec<ColumnPlan>,
}

impl RowTransformer {
    pub fn new(dest_columns: &[ColumnMetadata]) -> Self {
        let columns = dest_columns
            .iter()
            .map(|c| ColumnPlan {
                name: c.name.clone(),
                kind: ColumnKind::classify(&c.declared_type),
                max_length: c
                    .max_length
                    .and_then(|n| usize::try_from(n).ok())
                    .filter(|n| *n > 0),
            })
            .collect();

        Self { columns }
    }

    /// Destination column names, in the order `transform` emits values.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Coerce one source row. Columns the source lacks become NULL.
    pub fn transform(&self, row: &SourceRow) -> Result<Vec<SqlValue>, RowRejection> {
        self.columns
            .iter()
            .map(|plan| match row.get(&plan.name) {
                None | Some(SqlValue::Null) => Ok(SqlValue::Null),
                Some(value) => coerce(plan, value),
            })
            .collect()
    }
}

fn coerce(plan: &ColumnPlan, value: &SqlValue) -> Result<SqlValue, RowRejection> {
    let coerced = match plan.kind {
        ColumnKind::Temporal => {
            SqlValue::Text(to_temporal(value).ok_or_else(|| RowRejection::InvalidTemporal {
                column: plan.name.clone(),
                value: describe(value),
            })?)
        }
        ColumnKind::Json => to_json_text(value),
        ColumnKind::Numeric => to_numeric(value),
        // Binary payloads pass through untouched, even when they decode as UTF-8.
        ColumnKind::Text | ColumnKind::Other => match value.as_text() {
            Some(s) => SqlValue::Text(clean_text(s, plan.max_length)),
            None => value.clone(),
        },
    };

    if let SqlValue::Text(s) = &coerced {
        if s.len() > MAX_STRING_CHARS {
            let chars = s.chars().count();
            if chars > MAX_STRING_CHARS {
                return Err(RowRejection::Oversized {
                    column: plan.name.clone(),
                    chars,
                });
            }
        }
    }

    Ok(coerced)
}

/// String payload of text values, and of bytes that are valid UTF-8.
fn text_of(value: &SqlValue) -> Option<&str> {
    match value {
        SqlValue::Text(s) => Some(s),
        SqlValue::Bytes(b) => std::str::from_utf8(b).ok(),
        _ => None,
    }
}

/// Render a value as `YYYY-MM-DD HH:MM:SS` (UTC for zoned input), or
/// `HH:MM:SS` for time-of-day values.
fn to_temporal(value: &SqlValue) -> Option<String> {
    match value {
        SqlValue::DateTime(dt) => Some(dt.format(DATETIME_FORMAT).to_string()),
        SqlValue::Date(d) => Some(d.and_time(NaiveTime::MIN).format(DATETIME_FORMAT).to_string()),
        SqlValue::Time(t) => Some(t.format(TIME_FORMAT).to_string()),
        SqlValue::I64(ms) => from_epoch_millis(*ms),
        SqlValue::U64(ms) => i64::try_from(*ms).ok().and_then(from_epoch_millis),
        SqlValue::F64(ms) if ms.is_finite() => from_epoch_millis(ms.trunc() as i64),
        SqlValue::F32(ms) if ms.is_finite() => from_epoch_millis(ms.trunc() as i64),
        _ => text_of(value).and_then(parse_temporal_text),
    }
}

fn from_epoch_millis(ms: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.naive_utc().format(DATETIME_FORMAT).to_string())
}

fn parse_temporal_text(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).format(DATETIME_FORMAT).to_string());
    }

    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.format(DATETIME_FORMAT).to_string());
        }
    }

    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d.and_time(NaiveTime::MIN).format(DATETIME_FORMAT).to_string());
    }

    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .ok()
        .map(|t| t.format(TIME_FORMAT).to_string())
}

/// Strings pass through; everything else is serialized to JSON text.
fn to_json_text(value: &SqlValue) -> SqlValue {
    if let Some(s) = text_of(value) {
        return SqlValue::Text(s.to_string());
    }
    match value.to_json() {
        Some(json) => SqlValue::Text(json.to_string()),
        None => SqlValue::Null,
    }
}

fn to_numeric(value: &SqlValue) -> SqlValue {
    match value {
        SqlValue::Bool(b) => SqlValue::I64(i64::from(*b)),
        SqlValue::I64(_) | SqlValue::U64(_) | SqlValue::Decimal(_) => value.clone(),
        SqlValue::F32(f) if f.is_finite() => value.clone(),
        SqlValue::F64(f) if f.is_finite() => value.clone(),
        _ => text_of(value).map(parse_number).unwrap_or(SqlValue::Null),
    }
}

fn parse_number(raw: &str) -> SqlValue {
    let s = raw.trim();
    if s.is_empty() {
        return SqlValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return SqlValue::I64(i);
    }
    if let Ok(u) = s.parse::<u64>() {
        return SqlValue::U64(u);
    }
    if let Ok(d) = Decimal::from_str(s) {
        return SqlValue::Decimal(d);
    }
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() => SqlValue::F64(f),
        _ => SqlValue::Null,
    }
}

/// Strip NUL, normalize CRLF, truncate to `max_chars` characters.
fn clean_text(s: &str, max_chars: Option<usize>) -> String {
    let cleaned = s.replace('\0', "").replace("\r\n", "\n");
    match max_chars {
        Some(max) if cleaned.chars().count() > max => cleaned.chars().take(max).collect(),
        _ => cleaned,
    }
}

/// Short rendering of a rejected value for logs.
fn describe(value: &SqlValue) -> String {
    let text = match text_of(value) {
        Some(s) => s.to_string(),
        None => format!("<{}>", value.type_name()),
    };
    if text.chars().count() > 64 {
        format!("{}...", text.chars().take(64).collect::<String>())
    } else {
        text
    }
}
