//! Timestamp normalization for the pickup/dropoff columns.
//!
//! Source files carry these columns as text in several layouts (CSV), or as
//! Arrow timestamps already rendered by the Parquet conversion. Both end up as
//! canonical `YYYY-MM-DD HH:MM:SS[.fraction]` strings in a `TIMESTAMP` column.

use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::db::schema::SqlType;
use crate::formats::Batch;

const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// Parse a timestamp in any of the accepted layouts.
///
/// Offsets are converted to UTC and dropped.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();

    if let Some(ts) = DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
    {
        return Some(ts);
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.naive_utc());
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Render a timestamp the way every normalized value is stored
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(CANONICAL_FORMAT).to_string()
}

/// Blank text has no datetime and becomes NULL
fn normalize_value(value: &str, source_type: SqlType) -> Result<Option<String>> {
    if value.trim().is_empty() {
        return Ok(None);
    }

    let ts = if source_type.is_integer() {
        // Integer columns hold nanoseconds since the epoch
        let nanos: i64 = value
            .trim()
            .parse()
            .map_err(|e| anyhow!("'{}' is not an epoch timestamp: {}", value, e))?;
        DateTime::from_timestamp_nanos(nanos).naive_utc()
    } else {
        parse_timestamp(value).ok_or_else(|| anyhow!("'{}' is not a recognized datetime", value))?
    };

    Ok(Some(format_timestamp(&ts)))
}

/// Rewrite the named columns of a batch as canonical timestamps.
///
/// Every named column must be present. Columns that are already zoned
/// timestamps are left untouched.
pub fn normalize_datetime_columns(batch: &mut Batch, names: &[&str]) -> Result<()> {
    for name in names {
        let Some(col_idx) = batch.columns.iter().position(|c| c.name == *name) else {
            bail!("Column '{}' not found in source data", name);
        };

        let source_type = batch.columns[col_idx].sql_type;
        if source_type == SqlType::TimestampTz {
            continue;
        }

        for (row_idx, record) in batch.records.iter_mut().enumerate() {
            let Some(field) = record.fields.get_mut(col_idx) else {
                continue;
            };
            let Some(value) = field.as_deref() else {
                continue;
            };
            *field = normalize_value(value, source_type).map_err(|e| {
                anyhow!(
                    "Failed to convert column '{}' in batch row {}: {}",
                    name,
                    row_idx + 1,
                    e
                )
            })?;
        }

        batch.columns[col_idx].sql_type = SqlType::Timestamp;
    }

    Ok(())
}
