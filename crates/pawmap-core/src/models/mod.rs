//! Data models for sighting markers.
//!
//! - `Marker`, `NewMarker`, `MarkerUpdate`: a stray/lost-dog sighting and its
//!   create/update payloads
//! - `Area`: the grid cell a marker is bucketed into
//! - `Report`: a moderation flag against a marker
//! - `NearbyQuery`, `Envelope`: request and response shapes for the API

pub mod area;
pub mod marker;
pub mod query;
pub mod report;

pub use area::Area;
pub use marker::{
    ContactInfo, GeoJsonPoint, LocationDetail, Marker, MarkerImage, MarkerStatus, MarkerType,
    MarkerUpdate, NewMarker, OwnerProfile,
};
pub use query::{Envelope, NearbyQuery, Pagination, DEFAULT_RADIUS_METERS};
pub use report::{Report, ReportStatus};
