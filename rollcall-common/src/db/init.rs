//! Database initialization
//!
//! Opens (or creates) the SQLite database and idempotently creates every table
//! the attendance pipeline reads or writes. Roster and geofence tables are
//! owned by administration tooling outside this repository; they are created
//! here so a fresh database is usable end to end.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    apply_pragmas(&pool).await?;
    create_schema(&pool).await?;

    Ok(pool)
}

/// Connection pragmas: foreign keys, WAL journaling, busy timeout
///
/// WAL lets status polling readers proceed while a background task holds the
/// write lock during result application.
pub async fn apply_pragmas(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(pool).await?;
    Ok(())
}

/// Create all tables and indexes (idempotent, safe to call multiple times)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_classes_table(pool).await?;
    create_students_table(pool).await?;
    create_geofences_table(pool).await?;
    create_attendance_sessions_table(pool).await?;
    create_attendance_records_table(pool).await?;

    info!("Database tables initialized (classes, students, geofences, attendance_sessions, attendance_records)");
    Ok(())
}

async fn create_classes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS classes (
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL,
            name TEXT NOT NULL,
            code TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_students_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS students (
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL REFERENCES classes(id),
            roll_no TEXT NOT NULL,
            name TEXT NOT NULL,
            parent_email TEXT,
            parent_phone TEXT,
            is_active INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_students_class_active ON students(class_id, is_active)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_geofences_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS geofences (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            radius_meters REAL NOT NULL CHECK (radius_meters >= 0),
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_attendance_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance_sessions (
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL REFERENCES classes(id),
            teacher_id TEXT NOT NULL,
            video_ref TEXT NOT NULL,
            location_latitude REAL,
            location_longitude REAL,
            location_verified INTEGER NOT NULL DEFAULT 0,
            geofence_id TEXT,
            processing_status TEXT NOT NULL DEFAULT 'processing'
                CHECK (processing_status IN ('processing', 'completed', 'failed')),
            total_students INTEGER NOT NULL DEFAULT 0,
            present_count INTEGER NOT NULL DEFAULT 0,
            absent_count INTEGER NOT NULL DEFAULT 0,
            notes TEXT,
            session_date TEXT NOT NULL,
            created_at TEXT NOT NULL,
            processing_started_at TEXT,
            processing_completed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_sessions_teacher_date ON attendance_sessions(teacher_id, session_date)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_attendance_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance_records (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES attendance_sessions(id),
            student_id TEXT NOT NULL REFERENCES students(id),
            status TEXT NOT NULL CHECK (status IN ('present', 'absent')),
            confidence_score REAL,
            face_detected INTEGER NOT NULL DEFAULT 0,
            is_manual_override INTEGER NOT NULL DEFAULT 0,
            override_by TEXT,
            override_at TEXT,
            override_reason TEXT,
            notes TEXT,
            created_at TEXT NOT NULL,
            UNIQUE (session_id, student_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
