//! Attendance session orchestration
//!
//! Owns the session lifecycle: creation, background recognition, roster
//! reconciliation, teacher corrections, history reads, and parent
//! notifications.
//!
//! # Processing
//!
//! `create_session` persists the session as `processing` and returns at once;
//! [`SessionOrchestrator::spawn_processing`] runs the job on its own tokio
//! task. The job is spawned inside a supervising task, so an error or a panic
//! still ends with the session marked `failed`.
//!
//! # Consistency
//!
//! Result application and manual overrides take the per-session lock and run
//! in one transaction together with [`db::sessions::recompute_counts`], so
//! `present_count + absent_count == total_students` holds for every completed
//! session.

use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use rollcall_common::{Error, Result};

use super::geofence_validator::GeofenceValidator;
use super::notification_dispatcher::{NotificationDispatcher, NotificationOutcome};
use super::ownership;
use super::recognition_client::{RecognitionError, RecognitionRequest, Recognizer, StudentOutcome};
use super::session_locks::SessionLocks;
use crate::db;
use crate::db::records::ReconciledRecord;
use crate::db::sessions::SessionQuery;
use crate::models::{
    AttendanceRecord, AttendanceSession, Coordinate, ManualOverride, NewSession, ProcessingStatus,
    RecordStatus, RecordView, RosterStudent, SessionCounts, DEFAULT_OVERRIDE_REASON,
};

/// Largest page size accepted by the history listing
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Input of [`SessionOrchestrator::create_session`]
#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    pub class_id: Uuid,
    pub teacher_id: Uuid,
    pub video_ref: String,
    pub coordinate: Option<Coordinate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedSession {
    pub session_id: Uuid,
    pub status: ProcessingStatus,
    pub location_verified: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordUpdate {
    pub record: AttendanceRecord,
    pub session_counts: SessionCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDetail {
    pub session: AttendanceSession,
    pub records: Vec<RecordView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionPage {
    pub sessions: Vec<AttendanceSession>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationSummary {
    pub notifications_sent: usize,
    pub webhook_response: NotificationOutcome,
}

#[derive(Clone)]
pub struct SessionOrchestrator {
    db: SqlitePool,
    recognizer: Arc<dyn Recognizer>,
    notifier: Arc<NotificationDispatcher>,
    geofence: GeofenceValidator,
    locks: SessionLocks,
    job_slots: Arc<Semaphore>,
    recognition_timeout: Duration,
}

impl SessionOrchestrator {
    pub fn new(
        db: SqlitePool,
        recognizer: Arc<dyn Recognizer>,
        notifier: Arc<NotificationDispatcher>,
        recognition_timeout: Duration,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            geofence: GeofenceValidator::new(db.clone()),
            db,
            recognizer,
            notifier,
            locks: SessionLocks::new(),
            job_slots: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            recognition_timeout,
        }
    }

    pub fn recognizer(&self) -> &Arc<dyn Recognizer> {
        &self.recognizer
    }

    /// Validate, persist, and start processing a new session
    ///
    /// Returns as soon as the session row exists; recognition continues on a
    /// background task.
    pub async fn create_session(&self, request: CreateSessionRequest) -> Result<CreatedSession> {
        let video_ref = request.video_ref.trim();
        if video_ref.is_empty() {
            return Err(Error::InvalidInput("Video reference is required".to_string()));
        }
        if let Some(coordinate) = request.coordinate {
            if !coordinate.is_finite() {
                return Err(Error::InvalidInput(
                    "Latitude and longitude must be finite numbers".to_string(),
                ));
            }
        }

        ownership::verify_class_owner(&self.db, request.class_id, request.teacher_id).await?;

        let (location_verified, geofence_id) = match request.coordinate {
            Some(coordinate) => {
                let check = self.geofence.validate(coordinate).await;
                (check.valid, check.zone_id)
            }
            None => (false, None),
        };

        let total_students = db::roster::count_active_students(&self.db, request.class_id).await?;

        let session = db::sessions::insert_session(
            &self.db,
            &NewSession {
                class_id: request.class_id,
                teacher_id: request.teacher_id,
                video_ref: video_ref.to_string(),
                coordinate: request.coordinate,
                location_verified,
                geofence_id,
                total_students,
            },
        )
        .await?;

        info!(
            session_id = %session.id,
            class_id = %session.class_id,
            total_students,
            location_verified,
            "Attendance session created"
        );

        self.spawn_processing(session.id);

        Ok(CreatedSession {
            session_id: session.id,
            status: session.processing_status,
            location_verified,
        })
    }

    /// Run processing for a session on a background task
    ///
    /// The job runs in its own task so that a panic surfaces here as a
    /// `JoinError`; either way the session ends in a terminal state.
    pub fn spawn_processing(&self, session_id: Uuid) -> JoinHandle<()> {
        let supervisor = self.clone();

        tokio::spawn(async move {
            debug!(session_id = %session_id, "Background processing task started");

            let worker = supervisor.clone();
            let job = tokio::spawn(async move { worker.run_processing(session_id).await });

            let failure = match job.await {
                Ok(Ok(status)) => {
                    info!(session_id = %session_id, status = %status, "Background processing finished");
                    None
                }
                Ok(Err(e)) => {
                    error!(session_id = %session_id, error = %e, "Background processing failed");
                    Some(e.to_string())
                }
                Err(join_error) => {
                    error!(session_id = %session_id, error = %join_error, "Background processing task aborted");
                    Some("processing task aborted unexpectedly".to_string())
                }
            };

            if let Some(message) = failure {
                if let Err(e) = supervisor.fail_session(session_id, &message).await {
                    error!(session_id = %session_id, error = %e, "Failed to mark session as failed");
                }
            }
        })
    }

    /// Process one session to a terminal state
    ///
    /// Recognition failures are recorded on the session and reported as
    /// `Ok(Failed)`. `Err` means the session could not even be marked.
    pub async fn run_processing(&self, session_id: Uuid) -> Result<ProcessingStatus> {
        let session = db::sessions::load_session(&self.db, session_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Session not found: {}", session_id)))?;

        if !session
            .processing_status
            .can_transition_to(ProcessingStatus::Completed)
        {
            warn!(
                session_id = %session_id,
                status = %session.processing_status,
                "Session already processed, skipping"
            );
            return Ok(session.processing_status);
        }

        let _permit = self
            .job_slots
            .acquire()
            .await
            .map_err(|e| Error::Internal(format!("Processing slots closed: {}", e)))?;

        db::sessions::mark_processing_started(&self.db, session_id).await?;

        let request = RecognitionRequest {
            video_ref: session.video_ref.clone(),
            session_id,
            class_id: session.class_id,
        };

        let recognized = match tokio::time::timeout(
            self.recognition_timeout,
            self.recognizer.submit(&request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RecognitionError::Timeout(self.recognition_timeout)),
        };

        let result = match recognized {
            Ok(result) => result,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Face recognition failed");
                return self.fail_session(session_id, &e.to_string()).await;
            }
        };

        match self.apply_results(&session, &result.outcomes).await {
            Ok(counts) => {
                info!(
                    session_id = %session_id,
                    present = counts.present_count,
                    absent = counts.absent_count,
                    total = counts.total_students,
                    "Attendance results applied"
                );
                Ok(ProcessingStatus::Completed)
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Failed to apply attendance results");
                self.fail_session(session_id, &e.to_string()).await
            }
        }
    }

    /// Reconcile results against the active roster and complete the session
    ///
    /// All writes share one transaction; any error rolls the whole set back.
    async fn apply_results(
        &self,
        session: &AttendanceSession,
        outcomes: &[StudentOutcome],
    ) -> Result<SessionCounts> {
        let _guard = self.locks.lock(session.id).await;
        let mut tx = self.db.begin().await?;

        if !db::sessions::claim_for_completion(&mut *tx, session.id).await? {
            return Err(Error::Conflict(format!(
                "Session {} is no longer processing",
                session.id
            )));
        }

        let roster = db::roster::list_active_students(&mut *tx, session.class_id).await?;
        let roster_size = roster.len() as i64;
        if roster_size != session.total_students {
            warn!(
                session_id = %session.id,
                snapshot = session.total_students,
                current = roster_size,
                "Roster changed while processing; reconciling against current roster"
            );
        }

        for record in reconcile(&roster, outcomes) {
            let written = db::records::upsert_reconciled_record(&mut *tx, session.id, &record).await?;
            if !written {
                debug!(
                    session_id = %session.id,
                    student_id = %record.student_id,
                    "Manual override kept"
                );
            }
        }

        if !db::sessions::mark_completed(&mut *tx, session.id, roster_size).await? {
            return Err(Error::Conflict(format!(
                "Session {} is no longer processing",
                session.id
            )));
        }

        let counts = db::sessions::recompute_counts(&mut *tx, session.id).await?;
        if !counts.is_reconciled() {
            return Err(Error::Internal(format!(
                "Counts do not add up for session {}: {} present + {} absent != {}",
                session.id, counts.present_count, counts.absent_count, counts.total_students
            )));
        }
        tx.commit().await?;

        Ok(counts)
    }

    /// Mark a session failed with a readable reason
    ///
    /// A session already in a terminal state keeps that state, which is
    /// returned instead.
    async fn fail_session(&self, session_id: Uuid, message: &str) -> Result<ProcessingStatus> {
        let note = format!("Processing error: {}", message);

        if db::sessions::mark_failed(&self.db, session_id, &note).await? {
            info!(session_id = %session_id, note = %note, "Session marked failed");
            return Ok(ProcessingStatus::Failed);
        }

        let current = db::sessions::load_session(&self.db, session_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Session not found: {}", session_id)))?;
        Ok(current.processing_status)
    }

    /// Apply a teacher correction to one record
    pub async fn update_record(
        &self,
        record_id: Uuid,
        status: &str,
        notes: Option<String>,
        reason: Option<String>,
        actor_id: Uuid,
    ) -> Result<RecordUpdate> {
        let status: RecordStatus = status.parse()?;
        let session_id = ownership::verify_record_owner(&self.db, record_id, actor_id).await?;

        let correction = ManualOverride {
            status,
            notes,
            reason: reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_OVERRIDE_REASON.to_string()),
            actor_id,
        };

        let _guard = self.locks.lock(session_id).await;
        let mut tx = self.db.begin().await?;

        let record = db::records::apply_manual_override(&mut *tx, record_id, &correction)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Record not found: {}", record_id)))?;
        let session_counts = db::sessions::recompute_counts(&mut *tx, session_id).await?;

        tx.commit().await?;

        info!(
            session_id = %session_id,
            record_id = %record_id,
            status = %status,
            "Attendance record overridden"
        );

        Ok(RecordUpdate {
            record,
            session_counts,
        })
    }

    /// Session with its records in roll-number order
    pub async fn get_session(&self, session_id: Uuid, actor_id: Uuid) -> Result<SessionDetail> {
        ownership::verify_session_owner(&self.db, session_id, actor_id).await?;

        let session = db::sessions::load_session(&self.db, session_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Session not found: {}", session_id)))?;
        let records = db::records::list_session_records(&self.db, session_id).await?;

        Ok(SessionDetail { session, records })
    }

    /// Paginated session history of one teacher, newest first
    pub async fn list_sessions(&self, actor_id: Uuid, query: SessionQuery) -> Result<SessionPage> {
        if query.page < 1 {
            return Err(Error::InvalidInput("page must be at least 1".to_string()));
        }
        if query.limit < 1 || query.limit > MAX_PAGE_LIMIT {
            return Err(Error::InvalidInput(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_LIMIT
            )));
        }
        if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
            if start > end {
                return Err(Error::InvalidInput(
                    "start_date must not be after end_date".to_string(),
                ));
            }
        }

        let (sessions, total) = db::sessions::list_sessions(&self.db, actor_id, &query).await?;
        let limit = i64::from(query.limit);

        Ok(SessionPage {
            sessions,
            page: query.page,
            limit: query.limit,
            total,
            total_pages: (total + limit - 1) / limit,
        })
    }

    /// Send attendance notifications for a session to the parent webhook
    ///
    /// Delivery failures are reported in `webhook_response`, not as errors.
    pub async fn trigger_notifications(
        &self,
        session_id: Uuid,
        actor_id: Uuid,
    ) -> Result<NotificationSummary> {
        ownership::verify_session_owner(&self.db, session_id, actor_id).await?;

        let rows = db::roster::notification_rows(&self.db, session_id).await?;
        if rows.is_empty() {
            return Err(Error::InvalidInput(
                "No students with parent emails found".to_string(),
            ));
        }

        let webhook_response = self.notifier.send(session_id, &rows).await;

        Ok(NotificationSummary {
            notifications_sent: rows.len(),
            webhook_response,
        })
    }

    /// Recompute a session's counts from its records
    pub async fn recompute_counts(&self, session_id: Uuid) -> Result<SessionCounts> {
        let _guard = self.locks.lock(session_id).await;
        let mut tx = self.db.begin().await?;
        let counts = db::sessions::recompute_counts(&mut *tx, session_id).await?;
        tx.commit().await?;
        Ok(counts)
    }

    /// Fail sessions left in `processing` by a previous run
    pub async fn recover_stale_sessions(&self) -> Result<usize> {
        let failed = db::sessions::fail_stale_sessions(&self.db).await?;
        if failed > 0 {
            warn!(count = failed, "Marked interrupted sessions as failed");
        }
        Ok(failed)
    }
}

/// One record per roster student, in roster order
///
/// Students missing from the result are absent with no confidence. Entries
/// for students not on the roster are dropped. When a student appears more
/// than once, a present entry beats an absent one, then higher confidence
/// wins.
pub fn reconcile(roster: &[RosterStudent], outcomes: &[StudentOutcome]) -> Vec<ReconciledRecord> {
    let roster_ids: HashSet<Uuid> = roster.iter().map(|s| s.id).collect();

    let mut best: HashMap<Uuid, &StudentOutcome> = HashMap::new();
    let mut unknown = 0usize;
    for outcome in outcomes {
        if !roster_ids.contains(&outcome.student_id) {
            unknown += 1;
            debug!(student_id = %outcome.student_id, "Ignoring result for student not on active roster");
            continue;
        }
        best.entry(outcome.student_id)
            .and_modify(|current| {
                if outranks(outcome, *current) {
                    *current = outcome;
                }
            })
            .or_insert(outcome);
    }

    if unknown > 0 {
        warn!(count = unknown, "Recognition returned students not on the active roster");
    }

    roster
        .iter()
        .map(|student| match best.get(&student.id) {
            Some(outcome) => ReconciledRecord {
                student_id: student.id,
                status: if outcome.present {
                    RecordStatus::Present
                } else {
                    RecordStatus::Absent
                },
                confidence_score: outcome.confidence,
                face_detected: outcome.face_detected,
            },
            None => ReconciledRecord {
                student_id: student.id,
                status: RecordStatus::Absent,
                confidence_score: None,
                face_detected: false,
            },
        })
        .collect()
}

fn outranks(candidate: &StudentOutcome, current: &StudentOutcome) -> bool {
    if candidate.present != current.present {
        return candidate.present;
    }
    candidate.confidence.unwrap_or(f64::MIN) > current.confidence.unwrap_or(f64::MIN)
}
