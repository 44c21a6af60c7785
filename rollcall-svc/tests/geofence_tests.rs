//! Geofence validation against stored zones

mod helpers;

use helpers::*;
use rollcall_svc::db;
use rollcall_svc::models::{Coordinate, GeofenceCheck};
use rollcall_svc::services::{CreateSessionRequest, GeofenceValidator};
use uuid::Uuid;

#[tokio::test]
async fn test_no_zones_is_valid() {
    let (_dir, pool) = create_test_db().await;
    let validator = GeofenceValidator::new(pool);

    let check = validator.validate(Coordinate::new(12.9716, 77.5946)).await;
    assert_eq!(check, GeofenceCheck::permissive());
}

#[tokio::test]
async fn test_lookup_failure_fails_open() {
    let (_dir, pool) = create_test_db().await;
    seed_zone(&pool, "Campus", 0.0, 0.0, 10.0, "2024-01-01T00:00:00Z").await;
    pool.close().await;

    let check = GeofenceValidator::new(pool)
        .validate(Coordinate::new(45.0, 45.0))
        .await;
    assert!(check.valid);
    assert!(check.zone_id.is_none());
}

#[tokio::test]
async fn test_zones_are_evaluated_oldest_first() {
    let (_dir, pool) = create_test_db().await;
    // Inserted newest first; evaluation order must still follow created_at
    let tight = seed_zone(&pool, "Lecture Hall", 0.0, 0.0, 20.0, "2024-03-01T00:00:00Z").await;
    let wide = seed_zone(&pool, "Campus", 0.0, 0.001, 1_000.0, "2024-01-01T00:00:00Z").await;

    let zones = db::geofences::list_active_zones(&pool).await.unwrap();
    assert_eq!(zones.iter().map(|z| z.id).collect::<Vec<_>>(), vec![wide, tight]);

    let check = GeofenceValidator::new(pool)
        .validate(Coordinate::new(0.0, 0.0))
        .await;
    assert_eq!(check.zone_id, Some(wide));
    assert_eq!(check.zone_name.as_deref(), Some("Campus"));
}

#[tokio::test]
async fn test_outside_active_zones_is_invalid() {
    let (_dir, pool) = create_test_db().await;
    seed_zone(&pool, "Campus", 12.9716, 77.5946, 150.0, "2024-01-01T00:00:00Z").await;
    let inactive = seed_zone(&pool, "Annex", 20.0, 20.0, 500.0, "2024-01-02T00:00:00Z").await;
    sqlx::query("UPDATE geofences SET is_active = 0 WHERE id = ?")
        .bind(inactive.to_string())
        .execute(&pool)
        .await
        .unwrap();

    let check = GeofenceValidator::new(pool)
        .validate(Coordinate::new(20.0, 20.0))
        .await;
    assert_eq!(check, GeofenceCheck::outside());
}

#[tokio::test]
async fn test_session_records_location_outcome() {
    let (_dir, pool) = create_test_db().await;
    let teacher = Uuid::new_v4();
    let (class_id, _) = seed_roster(&pool, teacher, 1).await;
    let zone = seed_zone(&pool, "Campus", 12.9716, 77.5946, 200.0, "2024-01-01T00:00:00Z").await;
    let orchestrator = build_orchestrator(&pool, FixedRecognizer::new(vec![]));

    let inside = orchestrator
        .create_session(CreateSessionRequest {
            class_id,
            teacher_id: teacher,
            video_ref: "inside.mp4".into(),
            coordinate: Some(Coordinate::new(12.9720, 77.5946)),
        })
        .await
        .unwrap();
    assert!(inside.location_verified);

    let outside = orchestrator
        .create_session(CreateSessionRequest {
            class_id,
            teacher_id: teacher,
            video_ref: "outside.mp4".into(),
            coordinate: Some(Coordinate::new(13.5, 77.5946)),
        })
        .await
        .unwrap();
    assert!(!outside.location_verified);

    let stored = wait_for_terminal(&pool, inside.session_id).await;
    assert_eq!(stored.geofence_id, Some(zone));
    assert_eq!(stored.location_latitude, Some(12.9720));

    let stored = wait_for_terminal(&pool, outside.session_id).await;
    assert_eq!(stored.geofence_id, None);
    assert!(!stored.location_verified);
}
