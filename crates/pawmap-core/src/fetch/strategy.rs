use crate::api::request::{ALL_MARKERS_PATH, MARKERS_PATH};
use crate::api::MarkerRequest;
use crate::models::NearbyQuery;

/// Meters per degree of latitude, used for the rectangle approximation.
const METERS_PER_DEGREE: f64 = 111_000.0;

/// One way of asking the server for "markers near here".
///
/// Spatial query support differs between deployments, so the fetcher tries
/// several request shapes in a fixed order until one answers.
pub trait QueryStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Build the request for `query`. Must not perform IO.
    fn request(&self, query: &NearbyQuery) -> MarkerRequest;

    /// Whether the response ignores the query location and must be
    /// distance filtered locally.
    fn filters_client_side(&self) -> bool {
        false
    }
}

/// `GET /markers?longitude&latitude&radius`
#[derive(Debug, Clone, Copy)]
pub struct Coarse;

impl QueryStrategy for Coarse {
    fn name(&self) -> &'static str {
        "coarse"
    }

    fn request(&self, query: &NearbyQuery) -> MarkerRequest {
        MarkerRequest::get(MARKERS_PATH)
            .param("longitude", query.longitude)
            .param("latitude", query.latitude)
            .param("radius", query.radius)
    }
}

/// Coarse query with the server's alternate spatial operator.
#[derive(Debug, Clone, Copy)]
pub struct AlternateOperator;

impl QueryStrategy for AlternateOperator {
    fn name(&self) -> &'static str {
        "geo-within"
    }

    fn request(&self, query: &NearbyQuery) -> MarkerRequest {
        Coarse.request(query).param("queryMode", "geoWithin")
    }
}

/// Degree rectangle around the query point.
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox;

impl BoundingBox {
    /// `(lat_delta, lng_delta)` in degrees covering `query.radius`.
    pub fn deltas(query: &NearbyQuery) -> (f64, f64) {
        let lat_delta = query.radius / METERS_PER_DEGREE;
        let lng_delta = query.radius / (METERS_PER_DEGREE * query.latitude.to_radians().cos());
        (lat_delta, lng_delta)
    }
}

impl QueryStrategy for BoundingBox {
    fn name(&self) -> &'static str {
        "bounding-box"
    }

    fn request(&self, query: &NearbyQuery) -> MarkerRequest {
        let (lat_delta, lng_delta) = Self::deltas(query);
        MarkerRequest::get(MARKERS_PATH)
            .param("minLat", query.latitude - lat_delta)
            .param("maxLat", query.latitude + lat_delta)
            .param("minLng", query.longitude - lng_delta)
            .param("maxLng", query.longitude + lng_delta)
            .param("useRectQuery", true)
    }
}

/// `GET /markers/all`
#[derive(Debug, Clone, Copy)]
pub struct Unfiltered;

impl QueryStrategy for Unfiltered {
    fn name(&self) -> &'static str {
        "unfiltered"
    }

    fn request(&self, _query: &NearbyQuery) -> MarkerRequest {
        MarkerRequest::get(ALL_MARKERS_PATH)
    }

    fn filters_client_side(&self) -> bool {
        true
    }
}

/// `GET /markers` with no parameters, for servers that reject unknown ones.
#[derive(Debug, Clone, Copy)]
pub struct Bare;

impl QueryStrategy for Bare {
    fn name(&self) -> &'static str {
        "bare"
    }

    fn request(&self, _query: &NearbyQuery) -> MarkerRequest {
        MarkerRequest::get(MARKERS_PATH)
    }

    fn filters_client_side(&self) -> bool {
        true
    }
}

/// `POST /markers/search` with the query as JSON body.
#[derive(Debug, Clone, Copy)]
pub struct StructuredSearch;

impl QueryStrategy for StructuredSearch {
    fn name(&self) -> &'static str {
        "search"
    }

    fn request(&self, query: &NearbyQuery) -> MarkerRequest {
        MarkerRequest::Search(*query)
    }
}

/// The fallback chain, in the order it is tried.
pub fn default_strategies() -> Vec<Box<dyn QueryStrategy>> {
    vec![
        Box::new(Coarse),
        Box::new(AlternateOperator),
        Box::new(BoundingBox),
        Box::new(Unfiltered),
        Box::new(Bare),
        Box::new(StructuredSearch),
    ]
}
