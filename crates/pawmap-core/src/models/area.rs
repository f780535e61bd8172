use serde::{Deserialize, Serialize};

use crate::geo::{CellId, GeoPoint, GridIndexer};

/// A grid cell as persisted alongside markers.
///
/// Everything here is derived from `area_id`; areas are never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Area {
    #[serde(rename = "areaId")]
    pub area_id: String,
    /// Closed `[lon, lat]` ring of 5 points.
    pub polygon: Vec<[f64; 2]>,
    pub center: GeoPoint,
}

impl Area {
    pub fn from_cell(grid: &GridIndexer, cell: CellId) -> Self {
        Self {
            area_id: cell.to_string(),
            polygon: grid.cell_polygon(cell),
            center: grid.cell_bounds(cell).center,
        }
    }
}
