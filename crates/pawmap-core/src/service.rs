//! Front-end facade over the marker API.
//!
//! Reads go through the `ResilientFetcher`. Writes are forwarded to the API
//! once, with no retry; on success the retrieval cache is dropped so the
//! next nearby query sees the change.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::{ApiError, MarkerApi};
use crate::cache::RetrievalCache;
use crate::fetch::{ResilientFetcher, RetryPolicy};
use crate::models::{Marker, MarkerUpdate, NearbyQuery, NewMarker, Report};
use crate::notice::{Notice, Notifier};

pub struct MarkerService {
    api: Arc<dyn MarkerApi>,
    fetcher: ResilientFetcher,
    notifier: Notifier,
    current_user: Option<String>,
}

impl MarkerService {
    pub fn new(api: Arc<dyn MarkerApi>, cache: RetrievalCache, current_user: Option<String>) -> Self {
        let notifier = Notifier::new();
        let fetcher = ResilientFetcher::new(Arc::clone(&api), cache, notifier.clone());
        Self {
            api,
            fetcher,
            notifier,
            current_user,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.fetcher = self.fetcher.with_policy(policy);
        self
    }

    pub fn current_user(&self) -> Option<&str> {
        self.current_user.as_deref()
    }

    pub fn cache(&self) -> &RetrievalCache {
        self.fetcher.cache()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notifier.subscribe()
    }

    /// Whether the signed-in user owns `marker`. Anonymous users own nothing.
    pub fn can_edit(&self, marker: &Marker) -> bool {
        self.current_user
            .as_deref()
            .map(|user| marker.is_owned_by(user))
            .unwrap_or(false)
    }

    // ===== Reads =====

    pub async fn nearby(&self, query: &NearbyQuery) -> Vec<Marker> {
        self.fetcher.fetch(query).await
    }

    pub async fn nearby_with_cancel(
        &self,
        query: &NearbyQuery,
        cancel: &CancellationToken,
    ) -> Vec<Marker> {
        self.fetcher.fetch_with_cancel(query, cancel).await
    }

    pub async fn marker(&self, id: &str) -> Result<Marker, ApiError> {
        self.api.marker(id).await
    }

    pub async fn user_markers(&self, user_id: &str) -> Result<Vec<Marker>, ApiError> {
        self.api.user_markers(user_id).await
    }

    /// Markers posted by the signed-in user.
    pub async fn my_markers(&self) -> Result<Vec<Marker>, ApiError> {
        let user = self.current_user.as_deref().ok_or(ApiError::Unauthorized)?;
        self.user_markers(user).await
    }

    // ===== Writes =====

    pub async fn create(&self, marker: &NewMarker) -> Result<Marker, ApiError> {
        validate_new(marker)?;
        let created = self.api.create_marker(marker).await?;
        info!(id = %created.id, area = %created.area_id, "Marker created");
        self.markers_changed();
        Ok(created)
    }

    pub async fn update(&self, id: &str, update: &MarkerUpdate) -> Result<Marker, ApiError> {
        if update.is_empty() {
            return Err(ApiError::Validation("update has no fields".to_string()));
        }
        if let Some(expires_at) = update.expires_at {
            if expires_at <= Utc::now() {
                return Err(ApiError::Validation("expiry must be in the future".to_string()));
            }
        }
        let updated = self.api.update_marker(id, update).await?;
        info!(id, "Marker updated");
        self.markers_changed();
        Ok(updated)
    }

    pub async fn resolve(&self, id: &str) -> Result<Marker, ApiError> {
        let resolved = self.api.resolve_marker(id).await?;
        info!(id, "Marker resolved");
        self.markers_changed();
        Ok(resolved)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.api.delete_marker(id).await?;
        info!(id, "Marker deleted");
        self.markers_changed();
        Ok(())
    }

    pub async fn report(&self, id: &str, reason: &str) -> Result<Report, ApiError> {
        if reason.trim().is_empty() {
            return Err(ApiError::Validation("report reason is required".to_string()));
        }
        let report = self.api.report_marker(id, reason).await?;
        info!(id, report = %report.id, "Marker reported");
        self.markers_changed();
        Ok(report)
    }

    fn markers_changed(&self) {
        self.cache().clear();
        self.notifier.emit(Notice::MarkersUpdated);
        debug!("Cached nearby results invalidated");
    }
}

fn validate_new(marker: &NewMarker) -> Result<(), ApiError> {
    let location = marker
        .location()
        .ok_or_else(|| ApiError::Validation("marker location is required".to_string()))?;
    if !location.is_valid() {
        return Err(ApiError::Validation(format!(
            "coordinates out of range: {}, {}",
            location.latitude, location.longitude
        )));
    }
    if marker.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".to_string()));
    }
    if marker.expires_at <= Utc::now() {
        return Err(ApiError::Validation("expiry must be in the future".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::models::{ContactInfo, MarkerStatus, MarkerType};
    use crate::testing::{marker_at, FakeApi};
    use chrono::Duration;

    const HERE: GeoPoint = GeoPoint {
        longitude: 116.4074,
        latitude: 39.9042,
    };

    fn service(api: &Arc<FakeApi>, user: Option<&str>) -> MarkerService {
        let api: Arc<dyn MarkerApi> = api.clone();
        MarkerService::new(api, RetrievalCache::in_memory(), user.map(str::to_string))
    }

    fn new_marker() -> NewMarker {
        NewMarker {
            marker_type: MarkerType::LostDog,
            title: "Corgi missing".to_string(),
            description: String::new(),
            images: vec![],
            contact_info: ContactInfo::default(),
            expires_at: Utc::now() + Duration::days(3),
            latitude: Some(HERE.latitude),
            longitude: Some(HERE.longitude),
            address: None,
        }
    }

    #[tokio::test]
    async fn test_successful_write_clears_cache_and_notifies() {
        let api = Arc::new(FakeApi::serving(vec![marker_at("m1", HERE)]));
        let service = service(&api, Some("u1"));
        let mut notices = service.subscribe();

        service.nearby(&NearbyQuery::at(HERE)).await;
        assert!(service.cache().is_valid(&HERE));

        let resolved = service.resolve("m1").await.unwrap();
        assert_eq!(resolved.status, MarkerStatus::Resolved);
        assert!(service.cache().snapshot().is_none());
        assert_eq!(notices.recv().await.unwrap(), Notice::MarkersUpdated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_during_fetch_is_not_undone_by_it() {
        // First attempt fails, so the fetch is still waiting out its retry
        // delay when the delete lands.
        let api = Arc::new(
            FakeApi::serving(vec![marker_at("m1", HERE)]).succeed_when(|attempt, _| attempt > 0),
        );
        let service = service(&api, Some("u1"));

        let query = NearbyQuery::at(HERE);
        let (fetched, deleted) = tokio::join!(service.nearby(&query), async {
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            service.delete("m1").await
        });

        deleted.unwrap();
        assert_eq!(fetched.len(), 1);
        assert!(service.cache().snapshot().is_none());
    }

    #[tokio::test]
    async fn test_rejected_write_keeps_cache() {
        let api = Arc::new(FakeApi::serving(vec![marker_at("m1", HERE)]).denying_writes());
        let service = service(&api, Some("u2"));
        let mut notices = service.subscribe();
        service.nearby(&NearbyQuery::at(HERE)).await;

        let err = service.delete("m1").await.unwrap_err();
        assert!(matches!(err, ApiError::AccessDenied(_)));
        assert!(service.cache().is_valid(&HERE));
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_create_requires_coordinates() {
        let api = Arc::new(FakeApi::serving(vec![]));
        let service = service(&api, Some("u1"));

        let mut missing = new_marker();
        missing.longitude = None;
        assert!(matches!(
            service.create(&missing).await,
            Err(ApiError::Validation(_))
        ));

        let mut out_of_range = new_marker();
        out_of_range.latitude = Some(91.0);
        assert!(matches!(
            service.create(&out_of_range).await,
            Err(ApiError::Validation(_))
        ));

        let mut expired = new_marker();
        expired.expires_at = Utc::now() - Duration::minutes(1);
        assert!(matches!(
            service.create(&expired).await,
            Err(ApiError::Validation(_))
        ));

        let created = service.create(&new_marker()).await.unwrap();
        assert_eq!(created.title, "Corgi missing");
        assert_eq!(created.marker_type, MarkerType::LostDog);
    }

    #[tokio::test]
    async fn test_update_and_report_validation() {
        let api = Arc::new(FakeApi::serving(vec![marker_at("m1", HERE)]));
        let service = service(&api, Some("u1"));

        assert!(matches!(
            service.update("m1", &MarkerUpdate::default()).await,
            Err(ApiError::Validation(_))
        ));
        let update = MarkerUpdate {
            title: Some("Seen again".to_string()),
            ..Default::default()
        };
        assert_eq!(service.update("m1", &update).await.unwrap().title, "Seen again");

        assert!(matches!(
            service.report("m1", "  ").await,
            Err(ApiError::Validation(_))
        ));
        let report = service.report("m1", "spam").await.unwrap();
        assert_eq!(report.marker_id, "m1");
        assert!(matches!(
            service.report("missing", "spam").await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_can_edit_uses_current_user() {
        let api = Arc::new(FakeApi::serving(vec![]));
        let marker = marker_at("m1", HERE);

        assert!(service(&api, Some("u1")).can_edit(&marker));
        assert!(!service(&api, Some("u2")).can_edit(&marker));
        assert!(!service(&api, None).can_edit(&marker));
    }

    #[tokio::test]
    async fn test_my_markers_requires_login() {
        let api = Arc::new(FakeApi::serving(vec![marker_at("m1", HERE)]));

        assert!(matches!(
            service(&api, None).my_markers().await,
            Err(ApiError::Unauthorized)
        ));
        let mine = service(&api, Some("u1")).my_markers().await.unwrap();
        assert_eq!(mine.len(), 1);
        assert!(service(&api, Some("u2")).my_markers().await.unwrap().is_empty());
    }
}
