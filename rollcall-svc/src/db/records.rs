//! Attendance record database operations

use chrono::Utc;
use rollcall_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{parse_optional_timestamp, parse_optional_uuid, parse_timestamp, parse_uuid};
use crate::models::{AttendanceRecord, ManualOverride, RecordStatus, RecordView};

/// Outcome for one roster student, produced by result reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRecord {
    pub student_id: Uuid,
    pub status: RecordStatus,
    pub confidence_score: Option<f64>,
    pub face_detected: bool,
}

/// Insert or refresh the automated record of one student
///
/// Rows with `is_manual_override = 1` are left untouched. Returns false when
/// an existing manual override suppressed the write.
pub async fn upsert_reconciled_record<'e, E>(
    executor: E,
    session_id: Uuid,
    record: &ReconciledRecord,
) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO attendance_records (
            id, session_id, student_id, status, confidence_score, face_detected, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(session_id, student_id) DO UPDATE SET
            status = excluded.status,
            confidence_score = excluded.confidence_score,
            face_detected = excluded.face_detected
        WHERE attendance_records.is_manual_override = 0
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(session_id.to_string())
    .bind(record.student_id.to_string())
    .bind(record.status.as_str())
    .bind(record.confidence_score)
    .bind(record.face_detected)
    .bind(Utc::now().to_rfc3339())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Session and owning teacher of a record, `None` if the record does not exist
pub async fn record_owner(pool: &SqlitePool, record_id: Uuid) -> Result<Option<(Uuid, Uuid)>> {
    let row = sqlx::query(
        r#"
        SELECT ar.session_id, sess.teacher_id
        FROM attendance_records ar
        JOIN attendance_sessions sess ON ar.session_id = sess.id
        WHERE ar.id = ?
        "#,
    )
    .bind(record_id.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let session_id: String = row.try_get("session_id")?;
            let teacher_id: String = row.try_get("teacher_id")?;
            Ok(Some((
                parse_uuid(&session_id, "session_id")?,
                parse_uuid(&teacher_id, "teacher_id")?,
            )))
        }
        None => Ok(None),
    }
}

/// Apply a teacher correction and mark the record authoritative
pub async fn apply_manual_override<'e, E>(
    executor: E,
    record_id: Uuid,
    correction: &ManualOverride,
) -> Result<Option<AttendanceRecord>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        UPDATE attendance_records
        SET status = ?,
            is_manual_override = 1,
            override_by = ?,
            override_at = ?,
            override_reason = ?,
            notes = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(correction.status.as_str())
    .bind(correction.actor_id.to_string())
    .bind(Utc::now().to_rfc3339())
    .bind(&correction.reason)
    .bind(&correction.notes)
    .bind(record_id.to_string())
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(record_from_row).transpose()
}

/// Records of a session joined with student identity, in roll-number order
pub async fn list_session_records(pool: &SqlitePool, session_id: Uuid) -> Result<Vec<RecordView>> {
    let rows = sqlx::query(
        r#"
        SELECT ar.id, s.id AS student_id, s.roll_no, s.name,
               ar.status, ar.confidence_score, ar.face_detected, ar.is_manual_override
        FROM attendance_records ar
        JOIN students s ON ar.student_id = s.id
        WHERE ar.session_id = ?
        ORDER BY s.roll_no
        "#,
    )
    .bind(session_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<RecordView> {
            let id: String = row.try_get("id")?;
            let student_id: String = row.try_get("student_id")?;
            let status: String = row.try_get("status")?;
            Ok(RecordView {
                id: parse_uuid(&id, "id")?,
                student_id: parse_uuid(&student_id, "student_id")?,
                roll_no: row.try_get("roll_no")?,
                name: row.try_get("name")?,
                status: parse_status(&status)?,
                confidence_score: row.try_get("confidence_score")?,
                face_detected: row.try_get("face_detected")?,
                is_manual_override: row.try_get("is_manual_override")?,
            })
        })
        .collect()
}

/// Number of records stored for a session
pub async fn count_session_records(pool: &SqlitePool, session_id: Uuid) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM attendance_records WHERE session_id = ?")
        .bind(session_id.to_string())
        .fetch_one(pool)
        .await?;

    Ok(count)
}

fn parse_status(value: &str) -> Result<RecordStatus> {
    value.parse().map_err(|_| {
        rollcall_common::Error::Internal(format!("Unknown record status in storage: {}", value))
    })
}

fn record_from_row(row: &SqliteRow) -> Result<AttendanceRecord> {
    let id: String = row.try_get("id")?;
    let session_id: String = row.try_get("session_id")?;
    let student_id: String = row.try_get("student_id")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(AttendanceRecord {
        id: parse_uuid(&id, "id")?,
        session_id: parse_uuid(&session_id, "session_id")?,
        student_id: parse_uuid(&student_id, "student_id")?,
        status: parse_status(&status)?,
        confidence_score: row.try_get("confidence_score")?,
        face_detected: row.try_get("face_detected")?,
        is_manual_override: row.try_get("is_manual_override")?,
        override_by: parse_optional_uuid(row.try_get("override_by")?, "override_by")?,
        override_at: parse_optional_timestamp(row.try_get("override_at")?, "override_at")?,
        override_reason: row.try_get("override_reason")?,
        notes: row.try_get("notes")?,
        created_at: parse_timestamp(&created_at, "created_at")?,
    })
}
