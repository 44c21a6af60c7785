//! Attendance session database operations
//!
//! Status updates are conditional on `processing_status = 'processing'`, so
//! the storage layer itself refuses to move a session out of a terminal state.
//! Aggregate counts are only ever written by [`recompute_counts`].

use chrono::{NaiveDate, Utc};
use rollcall_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{parse_date, parse_optional_timestamp, parse_optional_uuid, parse_timestamp, parse_uuid};
use crate::models::{AttendanceSession, NewSession, ProcessingStatus, SessionCounts};

const SESSION_COLUMNS: &str = r#"
    id, class_id, teacher_id, video_ref,
    location_latitude, location_longitude, location_verified, geofence_id,
    processing_status, total_students, present_count, absent_count, notes,
    session_date, created_at, processing_started_at, processing_completed_at
"#;

/// Filters for the session history listing
#[derive(Debug, Clone)]
pub struct SessionQuery {
    pub class_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// 1-based page number
    pub page: u32,
    pub limit: u32,
}

impl Default for SessionQuery {
    fn default() -> Self {
        Self {
            class_id: None,
            start_date: None,
            end_date: None,
            page: 1,
            limit: 20,
        }
    }
}

/// Insert a new session in `processing` state
pub async fn insert_session(pool: &SqlitePool, new: &NewSession) -> Result<AttendanceSession> {
    let now = Utc::now();
    let session = AttendanceSession {
        id: Uuid::new_v4(),
        class_id: new.class_id,
        teacher_id: new.teacher_id,
        video_ref: new.video_ref.clone(),
        location_latitude: new.coordinate.map(|c| c.latitude),
        location_longitude: new.coordinate.map(|c| c.longitude),
        location_verified: new.location_verified,
        geofence_id: new.geofence_id,
        processing_status: ProcessingStatus::Processing,
        total_students: new.total_students,
        present_count: 0,
        absent_count: 0,
        notes: None,
        session_date: now.date_naive(),
        created_at: now,
        processing_started_at: None,
        processing_completed_at: None,
    };

    sqlx::query(
        r#"
        INSERT INTO attendance_sessions (
            id, class_id, teacher_id, video_ref,
            location_latitude, location_longitude, location_verified, geofence_id,
            processing_status, total_students, present_count, absent_count,
            session_date, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?)
        "#,
    )
    .bind(session.id.to_string())
    .bind(session.class_id.to_string())
    .bind(session.teacher_id.to_string())
    .bind(&session.video_ref)
    .bind(session.location_latitude)
    .bind(session.location_longitude)
    .bind(session.location_verified)
    .bind(session.geofence_id.map(|id| id.to_string()))
    .bind(session.processing_status.as_str())
    .bind(session.total_students)
    .bind(session.session_date.format("%Y-%m-%d").to_string())
    .bind(session.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(session)
}

/// Load a session by id
pub async fn load_session<'e, E>(executor: E, session_id: Uuid) -> Result<Option<AttendanceSession>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM attendance_sessions WHERE id = ?", SESSION_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(session_id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(session_from_row).transpose()
}

/// Owning teacher of a session, `None` if the session does not exist
pub async fn session_owner(pool: &SqlitePool, session_id: Uuid) -> Result<Option<Uuid>> {
    let owner: Option<String> =
        sqlx::query_scalar("SELECT teacher_id FROM attendance_sessions WHERE id = ?")
            .bind(session_id.to_string())
            .fetch_optional(pool)
            .await?;

    owner.map(|o| parse_uuid(&o, "teacher_id")).transpose()
}

/// Record the moment the background task picked the session up
pub async fn mark_processing_started(pool: &SqlitePool, session_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE attendance_sessions
        SET processing_started_at = ?
        WHERE id = ? AND processing_status = 'processing'
        "#,
    )
    .bind(Utc::now().to_rfc3339())
    .bind(session_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Take the database write lock for a session that is still `processing`
///
/// Meant as the first statement of a deferred transaction: a write before any
/// read makes SQLite wait on `busy_timeout` instead of failing with
/// `SQLITE_BUSY` on a stale read snapshot. Returns false when the session is
/// no longer in `processing`.
pub async fn claim_for_completion<'e, E>(executor: E, session_id: Uuid) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE attendance_sessions
        SET processing_status = processing_status
        WHERE id = ? AND processing_status = 'processing'
        "#,
    )
    .bind(session_id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Transition `processing → completed`
///
/// `total_students` is set to the roster size the results were reconciled
/// against. Returns false when the session was not in `processing`.
pub async fn mark_completed<'e, E>(executor: E, session_id: Uuid, total_students: i64) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE attendance_sessions
        SET processing_status = 'completed',
            processing_completed_at = ?,
            total_students = ?
        WHERE id = ? AND processing_status = 'processing'
        "#,
    )
    .bind(Utc::now().to_rfc3339())
    .bind(total_students)
    .bind(session_id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Transition `processing → failed`, storing the reason in `notes`
///
/// Returns false when the session was not in `processing`.
pub async fn mark_failed<'e, E>(executor: E, session_id: Uuid, note: &str) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE attendance_sessions
        SET processing_status = 'failed',
            processing_completed_at = ?,
            notes = ?
        WHERE id = ? AND processing_status = 'processing'
        "#,
    )
    .bind(Utc::now().to_rfc3339())
    .bind(note)
    .bind(session_id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Recompute present/absent counts from the current record set
///
/// The only code path that writes `present_count`/`absent_count`. Counts are
/// derived from the records in a single statement, never adjusted
/// incrementally, so repeated calls converge on the same values.
pub async fn recompute_counts<'e, E>(executor: E, session_id: Uuid) -> Result<SessionCounts>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        UPDATE attendance_sessions
        SET present_count = (
                SELECT COUNT(*) FROM attendance_records
                WHERE session_id = ?1 AND status = 'present'
            ),
            absent_count = (
                SELECT COUNT(*) FROM attendance_records
                WHERE session_id = ?1 AND status = 'absent'
            )
        WHERE id = ?1
        RETURNING total_students, present_count, absent_count
        "#,
    )
    .bind(session_id.to_string())
    .fetch_optional(executor)
    .await?;

    let row = row.ok_or_else(|| {
        rollcall_common::Error::NotFound(format!("Session not found: {}", session_id))
    })?;

    Ok(SessionCounts {
        total_students: row.try_get("total_students")?,
        present_count: row.try_get("present_count")?,
        absent_count: row.try_get("absent_count")?,
    })
}

/// List a teacher's sessions, newest first, with total matching count
pub async fn list_sessions(
    pool: &SqlitePool,
    teacher_id: Uuid,
    query: &SessionQuery,
) -> Result<(Vec<AttendanceSession>, i64)> {
    let mut select = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM attendance_sessions WHERE teacher_id = ",
        SESSION_COLUMNS
    ));
    select.push_bind(teacher_id.to_string());
    push_filters(&mut select, query);
    select.push(" ORDER BY session_date DESC, created_at DESC LIMIT ");
    select.push_bind(query.limit as i64);
    select.push(" OFFSET ");
    select.push_bind((query.page.saturating_sub(1) as i64) * query.limit as i64);

    let rows = select.build().fetch_all(pool).await?;
    let sessions = rows
        .iter()
        .map(session_from_row)
        .collect::<Result<Vec<_>>>()?;

    let mut count = QueryBuilder::<Sqlite>::new(
        "SELECT COUNT(*) FROM attendance_sessions WHERE teacher_id = ",
    );
    count.push_bind(teacher_id.to_string());
    push_filters(&mut count, query);
    let total: i64 = count.build_query_scalar::<i64>().fetch_one(pool).await?;

    Ok((sessions, total))
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &SessionQuery) {
    if let Some(class_id) = query.class_id {
        builder.push(" AND class_id = ");
        builder.push_bind(class_id.to_string());
    }
    if let Some(start) = query.start_date {
        builder.push(" AND session_date >= ");
        builder.push_bind(start.format("%Y-%m-%d").to_string());
    }
    if let Some(end) = query.end_date {
        builder.push(" AND session_date <= ");
        builder.push_bind(end.format("%Y-%m-%d").to_string());
    }
}

/// Fail sessions stranded in `processing` by a previous run
///
/// Background tasks die with the process, so any session still processing at
/// startup will never complete on its own.
pub async fn fail_stale_sessions(pool: &SqlitePool) -> Result<usize> {
    let result = sqlx::query(
        r#"
        UPDATE attendance_sessions
        SET processing_status = 'failed',
            processing_completed_at = ?,
            notes = 'Processing error: interrupted by service restart'
        WHERE processing_status = 'processing'
        "#,
    )
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() as usize)
}

fn session_from_row(row: &SqliteRow) -> Result<AttendanceSession> {
    let id: String = row.try_get("id")?;
    let class_id: String = row.try_get("class_id")?;
    let teacher_id: String = row.try_get("teacher_id")?;
    let status: String = row.try_get("processing_status")?;
    let session_date: String = row.try_get("session_date")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(AttendanceSession {
        id: parse_uuid(&id, "id")?,
        class_id: parse_uuid(&class_id, "class_id")?,
        teacher_id: parse_uuid(&teacher_id, "teacher_id")?,
        video_ref: row.try_get("video_ref")?,
        location_latitude: row.try_get("location_latitude")?,
        location_longitude: row.try_get("location_longitude")?,
        location_verified: row.try_get("location_verified")?,
        geofence_id: parse_optional_uuid(row.try_get("geofence_id")?, "geofence_id")?,
        processing_status: status.parse()?,
        total_students: row.try_get("total_students")?,
        present_count: row.try_get("present_count")?,
        absent_count: row.try_get("absent_count")?,
        notes: row.try_get("notes")?,
        session_date: parse_date(&session_date, "session_date")?,
        created_at: parse_timestamp(&created_at, "created_at")?,
        processing_started_at: parse_optional_timestamp(
            row.try_get("processing_started_at")?,
            "processing_started_at",
        )?,
        processing_completed_at: parse_optional_timestamp(
            row.try_get("processing_completed_at")?,
            "processing_completed_at",
        )?,
    })
}
