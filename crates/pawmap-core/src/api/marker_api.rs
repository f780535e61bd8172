use async_trait::async_trait;

use crate::models::{Marker, MarkerUpdate, NewMarker, Report};

use super::{ApiError, MarkerRequest};

/// The marker HTTP surface as seen by the client core.
///
/// `ApiClient` implements this over reqwest; tests substitute a scripted
/// implementation.
#[async_trait]
pub trait MarkerApi: Send + Sync {
    /// Run one "list markers" request shape.
    async fn query(&self, request: &MarkerRequest) -> Result<Vec<Marker>, ApiError>;

    async fn marker(&self, id: &str) -> Result<Marker, ApiError>;

    async fn user_markers(&self, user_id: &str) -> Result<Vec<Marker>, ApiError>;

    async fn create_marker(&self, marker: &NewMarker) -> Result<Marker, ApiError>;

    async fn update_marker(&self, id: &str, update: &MarkerUpdate) -> Result<Marker, ApiError>;

    async fn resolve_marker(&self, id: &str) -> Result<Marker, ApiError>;

    async fn delete_marker(&self, id: &str) -> Result<(), ApiError>;

    async fn report_marker(&self, id: &str, reason: &str) -> Result<Report, ApiError>;
}
