//! Roster rows read from the class/student tables

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RecordStatus;

/// Active student of a class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterStudent {
    pub id: Uuid,
    pub roll_no: String,
    pub name: String,
    pub parent_email: Option<String>,
    pub parent_phone: Option<String>,
}

/// One notification line sent to the webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRow {
    pub student_id: Uuid,
    pub student_name: String,
    pub roll_no: String,
    pub parent_email: String,
    pub parent_phone: Option<String>,
    pub status: RecordStatus,
    pub session_date: NaiveDate,
    pub class_name: String,
}
