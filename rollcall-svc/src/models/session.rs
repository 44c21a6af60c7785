//! Attendance session state machine
//!
//! A session is created in `processing` and moves exactly once to a terminal
//! state: `processing → completed` or `processing → failed`. Terminal states
//! are final; a failed session is never revived (the teacher re-uploads).

use chrono::{DateTime, NaiveDate, Utc};
use rollcall_common::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Session processing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    /// Recognition pending or in flight
    Processing,
    /// Results applied, counts consistent with roster
    Completed,
    /// Recognition or storage failed; see session notes
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }

    /// Only `processing → completed` and `processing → failed` are legal
    pub fn can_transition_to(&self, next: ProcessingStatus) -> bool {
        matches!(
            (self, next),
            (ProcessingStatus::Processing, ProcessingStatus::Completed)
                | (ProcessingStatus::Processing, ProcessingStatus::Failed)
        )
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(ProcessingStatus::Processing),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            other => Err(Error::Internal(format!(
                "Unknown processing status in storage: {}",
                other
            ))),
        }
    }
}

/// Capture location reported by the client
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

/// Aggregate counts of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounts {
    pub total_students: i64,
    pub present_count: i64,
    pub absent_count: i64,
}

impl SessionCounts {
    /// Present and absent add up to the roster size
    pub fn is_reconciled(&self) -> bool {
        self.present_count + self.absent_count == self.total_students
    }
}

/// Persisted attendance session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceSession {
    pub id: Uuid,
    pub class_id: Uuid,
    pub teacher_id: Uuid,
    pub video_ref: String,
    pub location_latitude: Option<f64>,
    pub location_longitude: Option<f64>,
    pub location_verified: bool,
    pub geofence_id: Option<Uuid>,
    pub processing_status: ProcessingStatus,
    pub total_students: i64,
    pub present_count: i64,
    pub absent_count: i64,
    pub notes: Option<String>,
    pub session_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
}

impl AttendanceSession {
    pub fn counts(&self) -> SessionCounts {
        SessionCounts {
            total_students: self.total_students,
            present_count: self.present_count,
            absent_count: self.absent_count,
        }
    }
}

/// Values needed to insert a new session
#[derive(Debug, Clone)]
pub struct NewSession {
    pub class_id: Uuid,
    pub teacher_id: Uuid,
    pub video_ref: String,
    pub coordinate: Option<Coordinate>,
    pub location_verified: bool,
    pub geofence_id: Option<Uuid>,
    pub total_students: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_processing_may_transition() {
        use ProcessingStatus::*;

        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(!Processing.can_transition_to(Processing));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Failed));
    }

    #[test]
    fn test_status_round_trips_through_storage_text() {
        for status in [
            ProcessingStatus::Processing,
            ProcessingStatus::Completed,
            ProcessingStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<ProcessingStatus>().unwrap(), status);
        }
        assert!("paused".parse::<ProcessingStatus>().is_err());
    }

    #[test]
    fn test_coordinate_finiteness() {
        assert!(Coordinate::new(12.97, 77.59).is_finite());
        assert!(!Coordinate::new(f64::NAN, 77.59).is_finite());
        assert!(!Coordinate::new(12.97, f64::INFINITY).is_finite());
    }
}
