//! Shared test utilities: temp databases, roster seeding, stub recognizers,
//! and in-process HTTP servers

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use rollcall_common::config::NotificationConfig;
use rollcall_svc::models::AttendanceSession;
use rollcall_svc::services::{
    NotificationDispatcher, RecognitionError, RecognitionRequest, RecognitionResult, Recognizer,
    SessionOrchestrator, StudentOutcome,
};
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

/// Create temporary test database with the full schema
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test_rollcall.db");
    let pool = rollcall_svc::db::init_database(&db_path).await.unwrap();
    (temp_dir, pool)
}

pub async fn seed_class(pool: &SqlitePool, teacher_id: Uuid, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO classes (id, teacher_id, name) VALUES (?, ?, ?)")
        .bind(id.to_string())
        .bind(teacher_id.to_string())
        .bind(name)
        .execute(pool)
        .await
        .unwrap();
    id
}

pub async fn seed_student(
    pool: &SqlitePool,
    class_id: Uuid,
    roll_no: &str,
    name: &str,
    parent_email: Option<&str>,
) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO students (id, class_id, roll_no, name, parent_email, parent_phone) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(class_id.to_string())
    .bind(roll_no)
    .bind(name)
    .bind(parent_email)
    .bind(parent_email.map(|_| "+10000000000"))
    .execute(pool)
    .await
    .unwrap();
    id
}

pub async fn deactivate_student(pool: &SqlitePool, student_id: Uuid) {
    sqlx::query("UPDATE students SET is_active = 0 WHERE id = ?")
        .bind(student_id.to_string())
        .execute(pool)
        .await
        .unwrap();
}

pub async fn seed_zone(
    pool: &SqlitePool,
    name: &str,
    latitude: f64,
    longitude: f64,
    radius_meters: f64,
    created_at: &str,
) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO geofences (id, name, latitude, longitude, radius_meters, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(name)
    .bind(latitude)
    .bind(longitude)
    .bind(radius_meters)
    .bind(created_at)
    .execute(pool)
    .await
    .unwrap();
    id
}

/// Class owned by `teacher_id` with students "01".."n"
pub async fn seed_roster(pool: &SqlitePool, teacher_id: Uuid, size: usize) -> (Uuid, Vec<Uuid>) {
    let class_id = seed_class(pool, teacher_id, "Physics 101").await;
    let mut students = Vec::with_capacity(size);
    for i in 1..=size {
        let roll_no = format!("{:02}", i);
        students.push(seed_student(pool, class_id, &roll_no, &format!("Student {}", roll_no), None).await);
    }
    (class_id, students)
}

pub fn present(student_id: Uuid, confidence: f64) -> StudentOutcome {
    StudentOutcome {
        student_id,
        present: true,
        confidence: Some(confidence),
        face_detected: true,
    }
}

/// Returns the same outcomes on every call and counts calls
#[derive(Default)]
pub struct FixedRecognizer {
    pub outcomes: Vec<StudentOutcome>,
    pub calls: AtomicUsize,
}

impl FixedRecognizer {
    pub fn new(outcomes: Vec<StudentOutcome>) -> Arc<Self> {
        Arc::new(Self {
            outcomes,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recognizer for FixedRecognizer {
    async fn submit(&self, _request: &RecognitionRequest) -> Result<RecognitionResult, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RecognitionResult {
            outcomes: self.outcomes.clone(),
        })
    }
}

pub struct FailingRecognizer(pub RecognitionError);

#[async_trait]
impl Recognizer for FailingRecognizer {
    async fn submit(&self, _request: &RecognitionRequest) -> Result<RecognitionResult, RecognitionError> {
        Err(self.0.clone())
    }
}

pub struct SlowRecognizer(pub Duration);

#[async_trait]
impl Recognizer for SlowRecognizer {
    async fn submit(&self, _request: &RecognitionRequest) -> Result<RecognitionResult, RecognitionError> {
        tokio::time::sleep(self.0).await;
        Ok(RecognitionResult::default())
    }
}

pub struct PanickingRecognizer;

#[async_trait]
impl Recognizer for PanickingRecognizer {
    async fn submit(&self, _request: &RecognitionRequest) -> Result<RecognitionResult, RecognitionError> {
        panic!("recognizer exploded");
    }
}

pub fn unconfigured_notifier() -> Arc<NotificationDispatcher> {
    Arc::new(
        NotificationDispatcher::new(&NotificationConfig {
            webhook_url: None,
            timeout_ms: 1_000,
        })
        .unwrap(),
    )
}

pub fn notifier_for(url: &str) -> Arc<NotificationDispatcher> {
    Arc::new(
        NotificationDispatcher::new(&NotificationConfig {
            webhook_url: Some(url.to_string()),
            timeout_ms: 1_000,
        })
        .unwrap(),
    )
}

pub fn build_orchestrator(pool: &SqlitePool, recognizer: Arc<dyn Recognizer>) -> SessionOrchestrator {
    SessionOrchestrator::new(
        pool.clone(),
        recognizer,
        unconfigured_notifier(),
        Duration::from_secs(5),
        4,
    )
}

/// Serve a router on an ephemeral local port
pub async fn spawn_server(router: axum::Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// URL of a local port nothing listens on
pub async fn refused_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Poll until the session leaves `processing`
pub async fn wait_for_terminal(pool: &SqlitePool, session_id: Uuid) -> AttendanceSession {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let session = rollcall_svc::db::sessions::load_session(pool, session_id)
            .await
            .unwrap()
            .expect("session should exist");
        if session.processing_status.is_terminal() {
            return session;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "session {} still processing",
            session_id
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

pub fn today() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}
