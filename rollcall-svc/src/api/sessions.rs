//! Attendance session endpoints
//!
//! POST   /api/attendance/sessions                              start a session
//! GET    /api/attendance/sessions                              session history
//! GET    /api/attendance/sessions/:session_id                  session with records
//! POST   /api/attendance/sessions/:session_id/notifications    notify parents

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::TeacherId;
use crate::db::sessions::SessionQuery;
use crate::error::{ApiError, ApiResult};
use crate::models::{Coordinate, ProcessingStatus};
use crate::services::{CreateSessionRequest, NotificationSummary, SessionDetail, SessionPage};
use crate::AppState;

/// POST /api/attendance/sessions request
#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    pub class_id: Uuid,
    /// Reference to the uploaded video (URL or storage key)
    #[serde(alias = "video_ref")]
    pub video_url: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub status: ProcessingStatus,
    pub location_verified: bool,
    pub message: String,
}

/// GET /api/attendance/sessions query
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub class_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl From<HistoryParams> for SessionQuery {
    fn from(params: HistoryParams) -> Self {
        let defaults = SessionQuery::default();
        SessionQuery {
            class_id: params.class_id,
            start_date: params.start_date,
            end_date: params.end_date,
            page: params.page.unwrap_or(defaults.page),
            limit: params.limit.unwrap_or(defaults.limit),
        }
    }
}

pub async fn create_session(
    State(state): State<AppState>,
    TeacherId(teacher_id): TeacherId,
    Json(body): Json<CreateSessionBody>,
) -> ApiResult<(StatusCode, Json<CreateSessionResponse>)> {
    let coordinate = match (body.latitude, body.longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinate::new(latitude, longitude)),
        (None, None) => None,
        _ => {
            return Err(ApiError::BadRequest(
                "latitude and longitude must be provided together".to_string(),
            ))
        }
    };

    let created = state
        .orchestrator
        .create_session(CreateSessionRequest {
            class_id: body.class_id,
            teacher_id,
            video_ref: body.video_url,
            coordinate,
        })
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateSessionResponse {
            session_id: created.session_id,
            status: created.status,
            location_verified: created.location_verified,
            message: "Video accepted. Processing started.".to_string(),
        }),
    ))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    TeacherId(teacher_id): TeacherId,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<SessionPage>> {
    let page = state
        .orchestrator
        .list_sessions(teacher_id, params.into())
        .await?;
    Ok(Json(page))
}

pub async fn get_session(
    State(state): State<AppState>,
    TeacherId(teacher_id): TeacherId,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionDetail>> {
    let detail = state
        .orchestrator
        .get_session(session_id, teacher_id)
        .await?;
    Ok(Json(detail))
}

pub async fn send_notifications(
    State(state): State<AppState>,
    TeacherId(teacher_id): TeacherId,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<NotificationSummary>> {
    let summary = state
        .orchestrator
        .trigger_notifications(session_id, teacher_id)
        .await?;
    Ok(Json(summary))
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/attendance/sessions",
            post(create_session).get(list_sessions),
        )
        .route("/api/attendance/sessions/:session_id", get(get_session))
        .route(
            "/api/attendance/sessions/:session_id/notifications",
            post(send_notifications),
        )
}
