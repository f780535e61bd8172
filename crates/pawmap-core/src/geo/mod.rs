//! Geospatial primitives.
//!
//! - `GridIndexer`: fixed 250m x 250m cell keys, bounds and neighborhoods
//! - `haversine`: great-circle distance shared by every other component
//! - `filter_by_distance`: radius pruning and nearest-first ordering

pub mod filter;
pub mod grid;

pub use filter::filter_by_distance;
pub use grid::{
    destination, haversine, is_valid_radius, CellBounds, CellId, GeoPoint, GridError,
    GridIndexer, EARTH_RADIUS_METERS, MAX_NEIGHBOR_RADIUS_METERS,
};
