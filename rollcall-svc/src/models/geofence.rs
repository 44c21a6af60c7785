//! Geofence zones and validation outcomes

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Circular zone a capture location may fall into
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeofenceZone {
    pub id: Uuid,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    pub is_active: bool,
}

/// Result of validating a coordinate against the active zones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceCheck {
    pub valid: bool,
    pub zone_id: Option<Uuid>,
    pub zone_name: Option<String>,
    pub distance_meters: Option<f64>,
}

impl GeofenceCheck {
    /// Valid without a matched zone (no zones configured, or lookup failed)
    pub fn permissive() -> Self {
        Self {
            valid: true,
            zone_id: None,
            zone_name: None,
            distance_meters: None,
        }
    }

    pub fn outside() -> Self {
        Self {
            valid: false,
            zone_id: None,
            zone_name: None,
            distance_meters: None,
        }
    }

    pub fn matched(zone: &GeofenceZone, distance_meters: f64) -> Self {
        Self {
            valid: true,
            zone_id: Some(zone.id),
            zone_name: Some(zone.name.clone()),
            distance_meters: Some(distance_meters),
        }
    }
}
