//! Caller identity
//!
//! Authentication happens upstream; this service trusts the teacher id the
//! gateway forwards in the `X-Teacher-Id` header.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

pub const TEACHER_ID_HEADER: &str = "x-teacher-id";

/// Authenticated teacher making the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeacherId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for TeacherId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(TEACHER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Missing X-Teacher-Id header".to_string()))?;

        let text = value
            .to_str()
            .map_err(|_| ApiError::Unauthorized("Malformed X-Teacher-Id header".to_string()))?;

        Uuid::parse_str(text.trim())
            .map(TeacherId)
            .map_err(|_| ApiError::Unauthorized("X-Teacher-Id must be a UUID".to_string()))
    }
}
