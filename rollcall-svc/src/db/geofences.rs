//! Geofence zone queries

use rollcall_common::Result;
use sqlx::{Row, SqlitePool};

use super::parse_uuid;
use crate::models::GeofenceZone;

/// Active zones in evaluation order (oldest first, id as tie-breaker)
pub async fn list_active_zones(pool: &SqlitePool) -> Result<Vec<GeofenceZone>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, latitude, longitude, radius_meters, is_active
        FROM geofences
        WHERE is_active = 1
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<GeofenceZone> {
            let id: String = row.try_get("id")?;
            Ok(GeofenceZone {
                id: parse_uuid(&id, "id")?,
                name: row.try_get("name")?,
                latitude: row.try_get("latitude")?,
                longitude: row.try_get("longitude")?,
                radius_meters: row.try_get("radius_meters")?,
                is_active: row.try_get("is_active")?,
            })
        })
        .collect()
}
