use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "snake_case")]
pub enum MarkerType {
    StrayDog,
    LostDog,
}

impl std::fmt::Display for MarkerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkerType::StrayDog => write!(f, "Stray dog"),
            MarkerType::LostDog => write!(f, "Lost dog"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "lowercase")]
pub enum MarkerStatus {
    #[default]
    Active,
    Resolved,
    Expired,
}

impl std::fmt::Display for MarkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkerStatus::Active => write!(f, "Active"),
            MarkerStatus::Resolved => write!(f, "Resolved"),
            MarkerStatus::Expired => write!(f, "Expired"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct MarkerImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct ContactInfo {
    pub name: Option<String>,
    pub phone: Option<String>,
    /// Messaging handle; older records call this `wechat`.
    #[serde(alias = "wechat")]
    pub contact: Option<String>,
}

impl ContactInfo {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none() && self.contact.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct LocationDetail {
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// GeoJSON-style point, `coordinates` is `[longitude, latitude]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct GeoJsonPoint {
    #[serde(rename = "type", default = "GeoJsonPoint::point_type")]
    pub kind: String,
    pub coordinates: Vec<f64>,
}

impl GeoJsonPoint {
    pub fn new(point: GeoPoint) -> Self {
        Self {
            kind: Self::point_type(),
            coordinates: vec![point.longitude, point.latitude],
        }
    }

    fn point_type() -> String {
        "Point".to_string()
    }

    pub fn to_point(&self) -> Option<GeoPoint> {
        match self.coordinates.as_slice() {
            [lon, lat, ..] => Some(GeoPoint::new(*lon, *lat)),
            _ => None,
        }
    }
}

/// Display fields for the user who posted a marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct OwnerProfile {
    #[serde(alias = "_id")]
    pub id: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Marker {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(rename = "areaId", default)]
    pub area_id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "markerType")]
    pub marker_type: MarkerType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<MarkerImage>,
    #[serde(rename = "contactInfo", default)]
    pub contact_info: ContactInfo,
    #[serde(default)]
    pub status: MarkerStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
    #[serde(rename = "locationDetail", default)]
    pub location_detail: LocationDetail,
    #[serde(rename = "reportCount", default)]
    pub report_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoJsonPoint>,
    /// Meters from the last query center, set by the distance filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerProfile>,
}

impl Marker {
    /// Resolve the marker location: explicit lat/lon first, then the nested
    /// GeoJSON point.
    pub fn coordinates(&self) -> Option<GeoPoint> {
        if let (Some(lat), Some(lon)) = (self.latitude, self.longitude) {
            return Some(GeoPoint::new(lon, lat));
        }
        self.location.as_ref().and_then(GeoJsonPoint::to_point)
    }

    /// Ownership comparator: callers pass the current user explicitly.
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Active and not yet past `expires_at`, whether or not the sweep ran.
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.status == MarkerStatus::Active && !self.is_expired_at(now)
    }

    pub fn contact_display(&self) -> String {
        let info = &self.contact_info;
        [info.name.as_deref(), info.phone.as_deref(), info.contact.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

/// Body of `POST /markers`: marker fields minus the system-managed ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct NewMarker {
    #[serde(rename = "markerType")]
    pub marker_type: MarkerType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<MarkerImage>,
    #[serde(rename = "contactInfo", default)]
    pub contact_info: ContactInfo,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl NewMarker {
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lon, lat)),
            _ => None,
        }
    }
}

/// Body of `PUT /markers/{id}`. Location is fixed at creation and cannot be
/// moved; only the address text may change.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct MarkerUpdate {
    #[serde(rename = "markerType", default, skip_serializing_if = "Option::is_none")]
    pub marker_type: Option<MarkerType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<MarkerImage>>,
    #[serde(rename = "contactInfo", default, skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<ContactInfo>,
    #[serde(rename = "expiresAt", default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl MarkerUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_marker() {
        let json = r#"{
            "_id": "65f1c0ffee",
            "areaId": "4443_8772",
            "userId": "u1",
            "markerType": "lost_dog",
            "title": "Brown terrier",
            "description": "Answers to Biscuit",
            "images": [{"url": "https://img/1.jpg"}],
            "contactInfo": {"name": "Li", "phone": "13800000000", "wechat": "li_w"},
            "status": "active",
            "createdAt": "2024-05-01T08:00:00Z",
            "expiresAt": "2024-05-08T08:00:00Z",
            "locationDetail": {"address": "Dongcheng", "latitude": 39.9, "longitude": 116.4},
            "reportCount": 2,
            "likes": []
        }"#;

        let marker: Marker = serde_json::from_str(json).expect("Failed to parse marker JSON");
        assert_eq!(marker.id, "65f1c0ffee");
        assert_eq!(marker.marker_type, MarkerType::LostDog);
        assert_eq!(marker.status, MarkerStatus::Active);
        assert_eq!(marker.contact_info.contact.as_deref(), Some("li_w"));
        assert_eq!(marker.report_count, 2);
        assert_eq!(marker.images[0].caption, None);
        // No top-level coordinates and no GeoJSON point.
        assert_eq!(marker.coordinates(), None);
    }

    #[test]
    fn test_coordinates_prefer_explicit_fields() {
        let json = r#"{
            "id": "m1", "userId": "u1", "markerType": "stray_dog", "title": "t",
            "createdAt": "2024-05-01T08:00:00Z", "expiresAt": "2024-05-08T08:00:00Z",
            "latitude": 1.0, "longitude": 2.0,
            "location": {"type": "Point", "coordinates": [20.0, 10.0]}
        }"#;
        let mut marker: Marker = serde_json::from_str(json).unwrap();
        assert_eq!(marker.coordinates(), Some(GeoPoint::new(2.0, 1.0)));

        marker.latitude = None;
        assert_eq!(marker.coordinates(), Some(GeoPoint::new(20.0, 10.0)));
    }

    #[test]
    fn test_visibility_and_ownership() {
        let now = Utc::now();
        let json = format!(
            r#"{{"id": "m1", "userId": "u1", "markerType": "stray_dog", "title": "t",
                "createdAt": "{}", "expiresAt": "{}"}}"#,
            (now - chrono::Duration::hours(1)).to_rfc3339(),
            (now + chrono::Duration::hours(1)).to_rfc3339(),
        );
        let mut marker: Marker = serde_json::from_str(&json).unwrap();

        assert!(marker.is_owned_by("u1"));
        assert!(!marker.is_owned_by("u2"));
        assert!(marker.is_visible_at(now));
        assert!(!marker.is_visible_at(now + chrono::Duration::hours(2)));

        marker.status = MarkerStatus::Resolved;
        assert!(!marker.is_visible_at(now));
    }

    #[test]
    fn test_update_serializes_only_set_fields() {
        let update = MarkerUpdate {
            title: Some("Found near the park".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"title": "Found near the park"}));
        assert!(MarkerUpdate::default().is_empty());
        assert!(!update.is_empty());
    }
}
