//! Shared fixtures for unit tests.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::api::{ApiError, MarkerApi, MarkerRequest};
use crate::geo::GeoPoint;
use crate::models::{
    ContactInfo, LocationDetail, Marker, MarkerStatus, MarkerType, MarkerUpdate, NewMarker,
    Report, ReportStatus,
};

/// An active stray-dog marker owned by `u1` at `point`, expiring in a week.
pub(crate) fn marker_at(id: &str, point: GeoPoint) -> Marker {
    let now = Utc::now();
    Marker {
        id: id.to_string(),
        area_id: String::new(),
        user_id: "u1".to_string(),
        marker_type: MarkerType::StrayDog,
        title: format!("Marker {}", id),
        description: String::new(),
        images: vec![],
        contact_info: ContactInfo::default(),
        status: MarkerStatus::Active,
        created_at: now,
        expires_at: now + Duration::days(7),
        location_detail: LocationDetail::default(),
        report_count: 0,
        latitude: Some(point.latitude),
        longitude: Some(point.longitude),
        location: None,
        distance: None,
        owner: None,
    }
}

type SuccessRule = Box<dyn Fn(usize, &MarkerRequest) -> bool + Send + Sync>;

/// Scripted `MarkerApi`: list queries succeed only when the rule says so,
/// and every list request is recorded in call order.
pub(crate) struct FakeApi {
    markers: Vec<Marker>,
    rule: SuccessRule,
    deny_writes: bool,
    calls: Mutex<Vec<MarkerRequest>>,
}

impl FakeApi {
    /// Answers every list query with `markers`.
    pub(crate) fn serving(markers: Vec<Marker>) -> Self {
        Self {
            markers,
            rule: Box::new(|_, _| true),
            deny_writes: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fails every list query.
    pub(crate) fn failing() -> Self {
        Self::serving(vec![]).succeed_when(|_, _| false)
    }

    /// `rule(attempt, request)` decides whether the attempt succeeds.
    /// `attempt` counts list queries from zero.
    pub(crate) fn succeed_when(
        mut self,
        rule: impl Fn(usize, &MarkerRequest) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.rule = Box::new(rule);
        self
    }

    /// Reject every mutation as the server would for a non-owner.
    pub(crate) fn denying_writes(mut self) -> Self {
        self.deny_writes = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<MarkerRequest> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls().len()
    }

    fn check_write(&self, id: &str) -> Result<(), ApiError> {
        if self.deny_writes {
            return Err(ApiError::AccessDenied(format!("not the owner of {}", id)));
        }
        Ok(())
    }

    fn find(&self, id: &str) -> Result<Marker, ApiError> {
        self.markers
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl MarkerApi for FakeApi {
    async fn query(&self, request: &MarkerRequest) -> Result<Vec<Marker>, ApiError> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            calls.push(request.clone());
            calls.len() - 1
        };
        if (self.rule)(attempt, request) {
            Ok(self.markers.clone())
        } else {
            Err(ApiError::ServerError(format!("{} failed", request)))
        }
    }

    async fn marker(&self, id: &str) -> Result<Marker, ApiError> {
        self.find(id)
    }

    async fn user_markers(&self, user_id: &str) -> Result<Vec<Marker>, ApiError> {
        Ok(self
            .markers
            .iter()
            .filter(|m| m.is_owned_by(user_id))
            .cloned()
            .collect())
    }

    async fn create_marker(&self, marker: &NewMarker) -> Result<Marker, ApiError> {
        self.check_write("new marker")?;
        let point = marker
            .location()
            .ok_or_else(|| ApiError::Validation("location is required".to_string()))?;
        let mut created = marker_at("created", point);
        created.title = marker.title.clone();
        created.marker_type = marker.marker_type;
        created.expires_at = marker.expires_at;
        Ok(created)
    }

    async fn update_marker(&self, id: &str, update: &MarkerUpdate) -> Result<Marker, ApiError> {
        self.check_write(id)?;
        let mut marker = self.find(id)?;
        if let Some(title) = &update.title {
            marker.title = title.clone();
        }
        Ok(marker)
    }

    async fn resolve_marker(&self, id: &str) -> Result<Marker, ApiError> {
        self.check_write(id)?;
        let mut marker = self.find(id)?;
        marker.status = MarkerStatus::Resolved;
        Ok(marker)
    }

    async fn delete_marker(&self, id: &str) -> Result<(), ApiError> {
        self.check_write(id)?;
        self.find(id).map(|_| ())
    }

    async fn report_marker(&self, id: &str, reason: &str) -> Result<Report, ApiError> {
        self.find(id)?;
        Ok(Report {
            id: "r1".to_string(),
            marker_id: id.to_string(),
            user_id: "u2".to_string(),
            reason: reason.to_string(),
            created_at: Utc::now(),
            status: ReportStatus::Pending,
        })
    }
}
