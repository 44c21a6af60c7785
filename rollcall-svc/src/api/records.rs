//! Attendance record corrections
//!
//! PATCH /api/attendance/records/:record_id

use axum::{
    extract::{Path, State},
    routing::patch,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::TeacherId;
use crate::error::ApiResult;
use crate::services::RecordUpdate;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateRecordBody {
    /// "present" or "absent"
    pub status: String,
    pub notes: Option<String>,
    pub override_reason: Option<String>,
}

pub async fn update_record(
    State(state): State<AppState>,
    TeacherId(teacher_id): TeacherId,
    Path(record_id): Path<Uuid>,
    Json(body): Json<UpdateRecordBody>,
) -> ApiResult<Json<RecordUpdate>> {
    let update = state
        .orchestrator
        .update_record(
            record_id,
            &body.status,
            body.notes,
            body.override_reason,
            teacher_id,
        )
        .await?;
    Ok(Json(update))
}

/// Build record routes
pub fn record_routes() -> Router<AppState> {
    Router::new().route("/api/attendance/records/:record_id", patch(update_record))
}
