//! Attendance records
//!
//! One record per student per session. A record carrying a manual override is
//! authoritative and is never rewritten by result application.

use chrono::{DateTime, Utc};
use rollcall_common::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Default override reason when the teacher gives none
pub const DEFAULT_OVERRIDE_REASON: &str = "Manual correction by teacher";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Present,
    Absent,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Present => "present",
            RecordStatus::Absent => "absent",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(RecordStatus::Present),
            "absent" => Ok(RecordStatus::Absent),
            other => Err(Error::InvalidInput(format!(
                "Invalid status '{}'. Must be present or absent",
                other
            ))),
        }
    }
}

/// Persisted attendance record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub status: RecordStatus,
    pub confidence_score: Option<f64>,
    pub face_detected: bool,
    pub is_manual_override: bool,
    pub override_by: Option<Uuid>,
    pub override_at: Option<DateTime<Utc>>,
    pub override_reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Record joined with student identity, as returned by session reads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordView {
    pub id: Uuid,
    pub student_id: Uuid,
    pub roll_no: String,
    pub name: String,
    pub status: RecordStatus,
    pub confidence_score: Option<f64>,
    pub face_detected: bool,
    pub is_manual_override: bool,
}

/// Teacher correction of a single record
#[derive(Debug, Clone)]
pub struct ManualOverride {
    pub status: RecordStatus,
    pub notes: Option<String>,
    pub reason: String,
    pub actor_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!("present".parse::<RecordStatus>().unwrap(), RecordStatus::Present);
        assert_eq!("absent".parse::<RecordStatus>().unwrap(), RecordStatus::Absent);
    }

    #[test]
    fn test_parse_invalid_status_is_input_error() {
        let err = "late".parse::<RecordStatus>().unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!("Present".parse::<RecordStatus>().is_err());
    }
}
