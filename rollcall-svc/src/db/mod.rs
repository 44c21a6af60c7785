//! Session store: persisted session, record, roster, and geofence state
//!
//! Identifiers are stored as hyphenated UUID text and timestamps as RFC 3339
//! text, so rows stay readable from the sqlite3 shell.

pub mod geofences;
pub mod records;
pub mod roster;
pub mod sessions;

use chrono::{DateTime, NaiveDate, Utc};
use rollcall_common::{Error, Result};
use uuid::Uuid;

pub use rollcall_common::db::init_database;

pub(crate) fn parse_uuid(value: &str, column: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

pub(crate) fn parse_optional_uuid(value: Option<String>, column: &str) -> Result<Option<Uuid>> {
    value.map(|v| parse_uuid(&v, column)).transpose()
}

pub(crate) fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

pub(crate) fn parse_optional_timestamp(
    value: Option<String>,
    column: &str,
) -> Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_timestamp(&v, column)).transpose()
}

pub(crate) fn parse_date(value: &str, column: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}
