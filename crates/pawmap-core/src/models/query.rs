use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// Default search radius for nearby queries, in meters.
pub const DEFAULT_RADIUS_METERS: f64 = 5000.0;

/// A "markers near me" request. Radius is in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct NearbyQuery {
    pub longitude: f64,
    pub latitude: f64,
    #[serde(default = "NearbyQuery::default_radius")]
    pub radius: f64,
}

impl NearbyQuery {
    pub fn new(longitude: f64, latitude: f64, radius: f64) -> Self {
        Self {
            longitude,
            latitude,
            radius,
        }
    }

    pub fn at(point: GeoPoint) -> Self {
        Self::new(point.longitude, point.latitude, DEFAULT_RADIUS_METERS)
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.longitude, self.latitude)
    }

    fn default_radius() -> f64 {
        DEFAULT_RADIUS_METERS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub pages: u32,
}

/// Response body shapes the marker endpoints are known to return:
/// `{"data": ..., "pagination": {...}}` or the bare payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Wrapped {
        data: T,
        #[serde(default)]
        pagination: Option<Pagination>,
    },
    Bare(T),
}

impl<T> Envelope<T> {
    pub fn into_parts(self) -> (T, Option<Pagination>) {
        match self {
            Envelope::Wrapped { data, pagination } => (data, pagination),
            Envelope::Bare(data) => (data, None),
        }
    }

    pub fn into_data(self) -> T {
        self.into_parts().0
    }
}
