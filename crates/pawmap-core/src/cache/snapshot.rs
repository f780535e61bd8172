use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;
use crate::models::Marker;

/// Snapshots older than this are never served as fresh.
pub const CACHE_MAX_AGE_MINUTES: i64 = 30;

/// Snapshots taken this far (meters) or further from the new query
/// location are never served as fresh.
pub const CACHE_MAX_DRIFT_METERS: f64 = 2000.0;

/// Result of the last successful marker fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub markers: Vec<Marker>,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "queryLocation")]
    pub query_location: GeoPoint,
}

impl CacheSnapshot {
    pub fn new(markers: Vec<Marker>, query_location: GeoPoint) -> Self {
        Self::taken_at(markers, query_location, Utc::now())
    }

    pub fn taken_at(markers: Vec<Marker>, query_location: GeoPoint, timestamp: DateTime<Utc>) -> Self {
        Self {
            markers,
            timestamp,
            query_location,
        }
    }

    /// Non-empty, younger than the age bound and taken close enough to
    /// `location`. Both bounds are exclusive.
    pub fn is_valid_at(&self, location: &GeoPoint, now: DateTime<Utc>) -> bool {
        if self.markers.is_empty() {
            return false;
        }
        let age = now - self.timestamp;
        if age >= chrono::Duration::minutes(CACHE_MAX_AGE_MINUTES) {
            return false;
        }
        self.query_location.distance_to(location) < CACHE_MAX_DRIFT_METERS
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.timestamp).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}
