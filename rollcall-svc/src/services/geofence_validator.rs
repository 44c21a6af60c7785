//! Geofence validation
//!
//! Geofencing is advisory: it records whether a capture happened inside a
//! configured zone but never blocks attendance capture. With no active zones,
//! or when the zone lookup fails, the coordinate is reported valid.

use sqlx::SqlitePool;
use tracing::{debug, error};

use crate::db;
use crate::models::{Coordinate, GeofenceCheck, GeofenceZone};

/// Mean Earth radius used by the haversine formula (meters)
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates in meters
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Check a coordinate against zones in the given order
///
/// First match wins, not nearest match. Inactive zones are skipped; if no
/// active zone remains the check is permissive.
pub fn check_zones(coordinate: Coordinate, zones: &[GeofenceZone]) -> GeofenceCheck {
    let mut any_active = false;

    for zone in zones.iter().filter(|z| z.is_active) {
        any_active = true;

        let distance = haversine_distance(
            coordinate.latitude,
            coordinate.longitude,
            zone.latitude,
            zone.longitude,
        );

        debug!(
            zone = %zone.name,
            distance_meters = distance,
            radius_meters = zone.radius_meters,
            "Geofence check"
        );

        if distance <= zone.radius_meters {
            return GeofenceCheck::matched(zone, distance);
        }
    }

    if any_active {
        GeofenceCheck::outside()
    } else {
        GeofenceCheck::permissive()
    }
}

/// Storage-backed geofence validator
#[derive(Clone)]
pub struct GeofenceValidator {
    db: SqlitePool,
}

impl GeofenceValidator {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Validate a coordinate against the active zones (fail-open)
    pub async fn validate(&self, coordinate: Coordinate) -> GeofenceCheck {
        match db::geofences::list_active_zones(&self.db).await {
            Ok(zones) => check_zones(coordinate, &zones),
            Err(e) => {
                error!(error = %e, "Geofence lookup failed, allowing location");
                GeofenceCheck::permissive()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn zone(name: &str, latitude: f64, longitude: f64, radius_meters: f64) -> GeofenceZone {
        GeofenceZone {
            id: Uuid::new_v4(),
            name: name.to_string(),
            latitude,
            longitude,
            radius_meters,
            is_active: true,
        }
    }

    #[test]
    fn test_haversine_zero_distance() {
        assert_eq!(haversine_distance(12.9716, 77.5946, 12.9716, 77.5946), 0.0);
    }

    #[test]
    fn test_haversine_one_degree_of_latitude() {
        // One degree along a meridian is R * pi / 180 ≈ 111,195 m
        let d = haversine_distance(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_194.93).abs() < 1.0, "got {}", d);
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let a = haversine_distance(51.5007, -0.1246, 40.6892, -74.0445);
        let b = haversine_distance(40.6892, -74.0445, 51.5007, -0.1246);
        assert!((a - b).abs() < 1e-6);
        // London to New York is roughly 5,570 km
        assert!((a / 1000.0 - 5_570.0).abs() < 30.0, "got {} km", a / 1000.0);
    }

    #[test]
    fn test_no_zones_is_permissive() {
        let check = check_zones(Coordinate::new(10.0, 10.0), &[]);
        assert_eq!(check, GeofenceCheck::permissive());
    }

    #[test]
    fn test_only_inactive_zones_is_permissive() {
        let mut campus = zone("Campus", 0.0, 0.0, 100.0);
        campus.is_active = false;

        let check = check_zones(Coordinate::new(45.0, 45.0), &[campus]);
        assert!(check.valid);
        assert!(check.zone_id.is_none());
    }

    #[test]
    fn test_inside_zone_matches() {
        let campus = zone("Campus", 12.9716, 77.5946, 200.0);
        // ~111 m north of the center
        let check = check_zones(Coordinate::new(12.9726, 77.5946), &[campus.clone()]);

        assert!(check.valid);
        assert_eq!(check.zone_id, Some(campus.id));
        assert_eq!(check.zone_name.as_deref(), Some("Campus"));
        let distance = check.distance_meters.unwrap();
        assert!(distance > 100.0 && distance < 120.0, "got {}", distance);
    }

    #[test]
    fn test_boundary_is_inside() {
        let center = zone("Edge", 0.0, 0.0, 0.0);
        let check = check_zones(Coordinate::new(0.0, 0.0), &[center]);
        assert!(check.valid);
        assert_eq!(check.distance_meters, Some(0.0));
    }

    #[test]
    fn test_outside_all_zones_is_invalid() {
        let campus = zone("Campus", 12.9716, 77.5946, 50.0);
        let check = check_zones(Coordinate::new(13.5, 77.5946), &[campus]);
        assert_eq!(check, GeofenceCheck::outside());
    }

    #[test]
    fn test_first_match_wins_over_nearest() {
        // Wide zone evaluated first, tight zone centered on the point second
        let wide = zone("Wide", 0.0, 0.001, 1_000.0);
        let tight = zone("Tight", 0.0, 0.0, 10.0);

        let check = check_zones(Coordinate::new(0.0, 0.0), &[wide.clone(), tight.clone()]);
        assert_eq!(check.zone_id, Some(wide.id));

        let check = check_zones(Coordinate::new(0.0, 0.0), &[tight.clone(), wide]);
        assert_eq!(check.zone_id, Some(tight.id));
    }
}
