//! Client-side distance pruning for marker lists.

use crate::models::Marker;

use super::GeoPoint;

/// Keep markers within `radius` meters of `center`, nearest first.
///
/// Each kept marker gets its `distance` field set. Markers whose location
/// cannot be resolved are dropped.
pub fn filter_by_distance<I>(markers: I, center: &GeoPoint, radius: f64) -> Vec<Marker>
where
    I: IntoIterator<Item = Marker>,
{
    let mut kept: Vec<Marker> = markers
        .into_iter()
        .filter_map(|mut marker| {
            let distance = marker.coordinates()?.distance_to(center);
            if !distance.is_finite() || distance > radius {
                return None;
            }
            marker.distance = Some(distance);
            Some(marker)
        })
        .collect();

    kept.sort_by(|a, b| {
        a.distance
            .unwrap_or(f64::INFINITY)
            .total_cmp(&b.distance.unwrap_or(f64::INFINITY))
    });
    kept
}
