//! Data models for attendance sessions, records, roster, and geofences

pub mod geofence;
pub mod record;
pub mod roster;
pub mod session;

pub use geofence::{GeofenceCheck, GeofenceZone};
pub use record::{
    AttendanceRecord, ManualOverride, RecordStatus, RecordView, DEFAULT_OVERRIDE_REASON,
};
pub use roster::{NotificationRow, RosterStudent};
pub use session::{
    AttendanceSession, Coordinate, NewSession, ProcessingStatus, SessionCounts,
};
