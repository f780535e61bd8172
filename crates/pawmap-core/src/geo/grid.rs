//! Fixed-size grid partitioning for marker locations.
//!
//! The grid uses an equirectangular approximation: latitude rows are a
//! constant height, longitude columns are scaled by the cosine of the
//! latitude. This is accurate for city-scale queries at moderate latitudes
//! and is not corrected near the poles or across the antimeridian.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// Earth radius in meters (WGS-84 equatorial).
pub const EARTH_RADIUS_METERS: f64 = 6_378_137.0;

/// Default cell width in meters.
pub const CELL_WIDTH_METERS: f64 = 250.0;

/// Default cell height in meters.
pub const CELL_HEIGHT_METERS: f64 = 250.0;

/// Largest radius a neighborhood lookup will cover.
pub const MAX_NEIGHBOR_RADIUS_METERS: f64 = 50_000.0;

// ============================================================================
// Types
// ============================================================================

/// A longitude/latitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Great-circle distance to another point in meters.
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        haversine(self.latitude, self.longitude, other.latitude, other.longitude)
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("Malformed cell id: {0}")]
    MalformedCellId(String),
}

/// Grid cell key, rendered as `"{lat_grid}_{lon_grid}"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId {
    pub lat_grid: i64,
    pub lon_grid: i64,
}

impl CellId {
    pub fn new(lat_grid: i64, lon_grid: i64) -> Self {
        Self { lat_grid, lon_grid }
    }

    /// The cell offset by the given number of rows and columns.
    pub fn offset(&self, d_lat: i64, d_lon: i64) -> Self {
        Self::new(self.lat_grid + d_lat, self.lon_grid + d_lon)
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.lat_grid, self.lon_grid)
    }
}

impl FromStr for CellId {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || GridError::MalformedCellId(s.to_string());
        let (lat, lon) = s.split_once('_').ok_or_else(malformed)?;
        let lat_grid = lat.parse::<i64>().map_err(|_| malformed())?;
        let lon_grid = lon.parse::<i64>().map_err(|_| malformed())?;
        Ok(Self::new(lat_grid, lon_grid))
    }
}

/// Edges and center of a grid cell, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
    pub center: GeoPoint,
}

impl CellBounds {
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.latitude >= self.south
            && point.latitude <= self.north
            && point.longitude >= self.west
            && point.longitude <= self.east
    }
}

// ============================================================================
// Grid Indexer
// ============================================================================

/// Computes cell ids, bounds and neighborhoods for a fixed cell size.
#[derive(Debug, Clone, Copy)]
pub struct GridIndexer {
    cell_width: f64,
    cell_height: f64,
}

impl Default for GridIndexer {
    fn default() -> Self {
        Self::new(CELL_WIDTH_METERS, CELL_HEIGHT_METERS)
    }
}

impl GridIndexer {
    pub fn new(cell_width: f64, cell_height: f64) -> Self {
        Self {
            cell_width,
            cell_height,
        }
    }

    pub fn cell_width(&self) -> f64 {
        self.cell_width
    }

    /// Cell containing the given point.
    ///
    /// Columns are scaled by the cosine of the row's center latitude, so every
    /// cell in a row has the same east-west extent in degrees.
    pub fn cell_id(&self, longitude: f64, latitude: f64) -> CellId {
        let lat_grid =
            (latitude.to_radians() * EARTH_RADIUS_METERS / self.cell_height).floor() as i64;
        CellId::new(lat_grid, self.column_in_row(longitude, lat_grid))
    }

    fn row_center_rad(&self, lat_grid: i64) -> f64 {
        (lat_grid as f64 + 0.5) * self.cell_height / EARTH_RADIUS_METERS
    }

    /// Meters per radian of longitude along the given row.
    fn row_scale(&self, lat_grid: i64) -> f64 {
        EARTH_RADIUS_METERS * self.row_center_rad(lat_grid).cos()
    }

    fn column_in_row(&self, longitude: f64, lat_grid: i64) -> i64 {
        (longitude.to_radians() * self.row_scale(lat_grid) / self.cell_width).floor() as i64
    }

    /// Edges of the cell in grid space, converted to degrees.
    pub fn cell_bounds(&self, cell: CellId) -> CellBounds {
        let lat_at = |row: f64| (row * self.cell_height / EARTH_RADIUS_METERS).to_degrees();
        let scale = self.row_scale(cell.lat_grid);
        let lon_at = |col: f64| (col * self.cell_width / scale).to_degrees();

        let row = cell.lat_grid as f64;
        let col = cell.lon_grid as f64;
        CellBounds {
            north: lat_at(row + 1.0),
            south: lat_at(row),
            east: lon_at(col + 1.0),
            west: lon_at(col),
            // Midpoint in grid space, so it maps back to `cell`.
            center: GeoPoint::new(lon_at(col + 0.5), lat_at(row + 0.5)),
        }
    }

    /// Cells whose centers lie within `radius` meters of the point.
    ///
    /// The containing cell is always first. Each row is scanned around the
    /// query longitude's column in that row, and candidates are pruned by
    /// center distance. NaN or negative radii yield only the containing
    /// cell; radii above [`MAX_NEIGHBOR_RADIUS_METERS`] are clamped.
    pub fn neighbor_cell_ids(&self, longitude: f64, latitude: f64, radius: f64) -> Vec<CellId> {
        let origin = GeoPoint::new(longitude, latitude);
        let home = self.cell_id(longitude, latitude);
        let radius = clamp_radius(radius);
        let row_count = (radius / self.cell_height).ceil() as i64;
        // One spare column absorbs the cosine drift between rows.
        let col_count = (radius / self.cell_width).ceil() as i64 + 1;

        let mut cells = vec![home];
        for lat_grid in home.lat_grid - row_count..=home.lat_grid + row_count {
            let column = self.column_in_row(longitude, lat_grid);
            for lon_grid in column - col_count..=column + col_count {
                let candidate = CellId::new(lat_grid, lon_grid);
                if candidate == home {
                    continue;
                }
                let center = self.cell_bounds(candidate).center;
                if origin.distance_to(&center) <= radius {
                    cells.push(candidate);
                }
            }
        }
        cells
    }

    /// Closed 5-point `[lon, lat]` ring around the cell.
    pub fn cell_polygon(&self, cell: CellId) -> Vec<[f64; 2]> {
        let b = self.cell_bounds(cell);
        vec![
            [b.west, b.north],
            [b.east, b.north],
            [b.east, b.south],
            [b.west, b.south],
            [b.west, b.north],
        ]
    }

    pub fn contains_point(&self, longitude: f64, latitude: f64, cell: CellId) -> bool {
        self.cell_bounds(cell)
            .contains(&GeoPoint::new(longitude, latitude))
    }
}

/// Whether `radius` is usable for a neighborhood lookup.
pub fn is_valid_radius(radius: f64) -> bool {
    radius.is_finite() && (0.0..=MAX_NEIGHBOR_RADIUS_METERS).contains(&radius)
}

fn clamp_radius(radius: f64) -> f64 {
    if radius.is_nan() || radius < 0.0 {
        0.0
    } else {
        radius.min(MAX_NEIGHBOR_RADIUS_METERS)
    }
}

/// Great-circle distance between two points in meters.
pub fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * a.sqrt().min(1.0).asin()
}

/// Point at the given distance (meters) and bearing (degrees from north).
///
/// Inverse of [`haversine`] on the same sphere; used to place points at a
/// known distance.
pub fn destination(origin: &GeoPoint, bearing_deg: f64, distance: f64) -> GeoPoint {
    let delta = distance / EARTH_RADIUS_METERS;
    let theta = bearing_deg.to_radians();
    let phi1 = origin.latitude.to_radians();
    let lambda1 = origin.longitude.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    GeoPoint::new(lambda2.to_degrees(), phi2.to_degrees())
}

// ============================================================================
// Tests
// ============================================================================
