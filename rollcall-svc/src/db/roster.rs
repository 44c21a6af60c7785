//! Read-only roster queries (classes and students)

use rollcall_common::Result;
use sqlx::{Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{parse_date, parse_uuid};
use crate::models::{NotificationRow, RecordStatus, RosterStudent};

/// Owning teacher of a class, `None` if the class does not exist
pub async fn class_owner(pool: &SqlitePool, class_id: Uuid) -> Result<Option<Uuid>> {
    let owner: Option<String> = sqlx::query_scalar("SELECT teacher_id FROM classes WHERE id = ?")
        .bind(class_id.to_string())
        .fetch_optional(pool)
        .await?;

    owner.map(|o| parse_uuid(&o, "teacher_id")).transpose()
}

/// Number of active students in a class
pub async fn count_active_students(pool: &SqlitePool, class_id: Uuid) -> Result<i64> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM students WHERE class_id = ? AND is_active = 1",
    )
    .bind(class_id.to_string())
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Active students of a class in roll-number order
pub async fn list_active_students<'e, E>(executor: E, class_id: Uuid) -> Result<Vec<RosterStudent>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT id, roll_no, name, parent_email, parent_phone
        FROM students
        WHERE class_id = ? AND is_active = 1
        ORDER BY roll_no
        "#,
    )
    .bind(class_id.to_string())
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| -> Result<RosterStudent> {
            let id: String = row.try_get("id")?;
            Ok(RosterStudent {
                id: parse_uuid(&id, "id")?,
                roll_no: row.try_get("roll_no")?,
                name: row.try_get("name")?,
                parent_email: row.try_get("parent_email")?,
                parent_phone: row.try_get("parent_phone")?,
            })
        })
        .collect()
}

/// Notification lines for every record whose student has a parent email
pub async fn notification_rows(pool: &SqlitePool, session_id: Uuid) -> Result<Vec<NotificationRow>> {
    let rows = sqlx::query(
        r#"
        SELECT s.id AS student_id, s.name AS student_name, s.roll_no,
               s.parent_email, s.parent_phone, ar.status,
               sess.session_date, c.name AS class_name
        FROM attendance_records ar
        JOIN students s ON ar.student_id = s.id
        JOIN attendance_sessions sess ON ar.session_id = sess.id
        JOIN classes c ON sess.class_id = c.id
        WHERE ar.session_id = ?
          AND s.parent_email IS NOT NULL
          AND TRIM(s.parent_email) != ''
        ORDER BY s.roll_no
        "#,
    )
    .bind(session_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<NotificationRow> {
            let student_id: String = row.try_get("student_id")?;
            let status: String = row.try_get("status")?;
            let session_date: String = row.try_get("session_date")?;
            Ok(NotificationRow {
                student_id: parse_uuid(&student_id, "student_id")?,
                student_name: row.try_get("student_name")?,
                roll_no: row.try_get("roll_no")?,
                parent_email: row.try_get("parent_email")?,
                parent_phone: row.try_get("parent_phone")?,
                status: status.parse::<RecordStatus>()?,
                session_date: parse_date(&session_date, "session_date")?,
                class_name: row.try_get("class_name")?,
            })
        })
        .collect()
}
