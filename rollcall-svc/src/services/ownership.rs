//! Ownership checks
//!
//! Every teacher-facing operation resolves the owning teacher of the target
//! first. A missing target is `NotFound`; one owned by someone else is
//! `Forbidden`.

use rollcall_common::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;

pub async fn verify_class_owner(pool: &SqlitePool, class_id: Uuid, actor_id: Uuid) -> Result<()> {
    match db::roster::class_owner(pool, class_id).await? {
        None => Err(Error::NotFound(format!("Class not found: {}", class_id))),
        Some(owner) if owner != actor_id => Err(Error::Forbidden(
            "You do not have access to this class".to_string(),
        )),
        Some(_) => Ok(()),
    }
}

pub async fn verify_session_owner(pool: &SqlitePool, session_id: Uuid, actor_id: Uuid) -> Result<()> {
    match db::sessions::session_owner(pool, session_id).await? {
        None => Err(Error::NotFound(format!("Session not found: {}", session_id))),
        Some(owner) if owner != actor_id => Err(Error::Forbidden(
            "You do not have access to this session".to_string(),
        )),
        Some(_) => Ok(()),
    }
}

/// Verify a record through its session; returns the session id
pub async fn verify_record_owner(pool: &SqlitePool, record_id: Uuid, actor_id: Uuid) -> Result<Uuid> {
    match db::records::record_owner(pool, record_id).await? {
        None => Err(Error::NotFound(format!("Record not found: {}", record_id))),
        Some((_, owner)) if owner != actor_id => Err(Error::Forbidden(
            "You do not have access to this record".to_string(),
        )),
        Some((session_id, _)) => Ok(session_id),
    }
}
