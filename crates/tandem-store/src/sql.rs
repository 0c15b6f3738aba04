//! Column-parsing helpers shared by the `row_to_*` mappers.
//!
//! Every parse failure is reported as `FromSqlConversionFailure` with the
//! offending column index so rusqlite errors stay diagnosable.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

fn conversion_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

pub fn parse_uuid(idx: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| conversion_err(idx, e))
}

pub fn parse_uuid_opt(idx: usize, s: Option<String>) -> rusqlite::Result<Option<Uuid>> {
    s.map(|v| parse_uuid(idx, &v)).transpose()
}

pub fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

pub fn parse_ts_opt(idx: usize, s: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    s.map(|v| parse_ts(idx, &v)).transpose()
}

pub fn parse_date(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| conversion_err(idx, e))
}

pub fn parse_date_opt(idx: usize, s: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    s.map(|v| parse_date(idx, &v)).transpose()
}

/// Parse a TEXT column holding one of our lifecycle enums via its `parse`
/// function.
pub fn parse_enum<T>(
    idx: usize,
    s: &str,
    parse: fn(&str) -> Option<T>,
    what: &'static str,
) -> rusqlite::Result<T> {
    parse(s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("invalid {what}: {s}").into(),
        )
    })
}

pub fn date_str(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}
