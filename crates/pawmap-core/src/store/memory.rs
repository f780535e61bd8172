use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::geo::{
    filter_by_distance, is_valid_radius, GeoPoint, GridIndexer, MAX_NEIGHBOR_RADIUS_METERS,
};
use crate::models::{
    Area, GeoJsonPoint, LocationDetail, Marker, MarkerStatus, MarkerUpdate, NewMarker,
    OwnerProfile, Report, ReportStatus,
};

use super::StoreError;

/// Length of generated ids in bytes (rendered as hex).
const ID_BYTES: usize = 12;

#[derive(Default)]
struct StoreState {
    markers: HashMap<String, Marker>,
    reports: Vec<Report>,
    areas: HashMap<String, Area>,
    users: HashMap<String, OwnerProfile>,
}

impl StoreState {
    fn with_owner(&self, mut marker: Marker) -> Marker {
        marker.owner = self.users.get(&marker.user_id).cloned();
        marker
    }

    fn marker_mut(&mut self, id: &str) -> Result<&mut Marker, StoreError> {
        self.markers
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn owned_marker_mut(&mut self, id: &str, requester: &str) -> Result<&mut Marker, StoreError> {
        let marker = self.marker_mut(id)?;
        if !marker.is_owned_by(requester) {
            return Err(StoreError::NotAuthorized {
                marker_id: id.to_string(),
                user_id: requester.to_string(),
            });
        }
        Ok(marker)
    }
}

/// Server-side marker storage bucketed by grid cell.
///
/// Writes are serialized by a single lock, so a report and its
/// `report_count` increment land together.
pub struct MarkerStore {
    grid: GridIndexer,
    state: RwLock<StoreState>,
}

impl Default for MarkerStore {
    fn default() -> Self {
        Self::new(GridIndexer::default())
    }
}

impl MarkerStore {
    pub fn new(grid: GridIndexer) -> Self {
        Self {
            grid,
            state: RwLock::new(StoreState::default()),
        }
    }

    pub fn grid(&self) -> &GridIndexer {
        &self.grid
    }

    /// Record display fields for a user so reads can attach them.
    pub async fn register_user(&self, profile: OwnerProfile) {
        let mut state = self.state.write().await;
        state.users.insert(profile.id.clone(), profile);
    }

    // ===== Writes =====

    pub async fn create(&self, owner_id: &str, data: NewMarker) -> Result<Marker, StoreError> {
        self.create_at(owner_id, data, Utc::now()).await
    }

    async fn create_at(
        &self,
        owner_id: &str,
        data: NewMarker,
        now: DateTime<Utc>,
    ) -> Result<Marker, StoreError> {
        let point = validate_new(&data, now)?;
        let cell = self.grid.cell_id(point.longitude, point.latitude);
        let area_id = cell.to_string();

        let marker = Marker {
            id: new_id(),
            area_id: area_id.clone(),
            user_id: owner_id.to_string(),
            marker_type: data.marker_type,
            title: data.title.trim().to_string(),
            description: data.description,
            images: data.images,
            contact_info: data.contact_info,
            status: MarkerStatus::Active,
            created_at: now,
            expires_at: data.expires_at,
            location_detail: LocationDetail {
                address: data.address,
                latitude: Some(point.latitude),
                longitude: Some(point.longitude),
            },
            report_count: 0,
            latitude: Some(point.latitude),
            longitude: Some(point.longitude),
            location: Some(GeoJsonPoint::new(point)),
            distance: None,
            owner: None,
        };

        let mut state = self.state.write().await;
        state
            .areas
            .entry(area_id.clone())
            .or_insert_with(|| Area::from_cell(&self.grid, cell));
        state.markers.insert(marker.id.clone(), marker.clone());

        info!(marker_id = %marker.id, area_id = %area_id, owner = owner_id, "Marker created");
        Ok(state.with_owner(marker))
    }

    /// Owner-only edit. The area and coordinates never change.
    pub async fn update(
        &self,
        id: &str,
        requester: &str,
        update: MarkerUpdate,
    ) -> Result<Marker, StoreError> {
        let mut state = self.state.write().await;
        let marker = state.owned_marker_mut(id, requester)?;

        if let Some(title) = &update.title {
            if title.trim().is_empty() {
                return Err(StoreError::Validation("title must not be empty".to_string()));
            }
        }
        if let Some(expires_at) = update.expires_at {
            if expires_at <= marker.created_at {
                return Err(StoreError::Validation(
                    "expiresAt must be after createdAt".to_string(),
                ));
            }
        }

        if let Some(marker_type) = update.marker_type {
            marker.marker_type = marker_type;
        }
        if let Some(title) = update.title {
            marker.title = title.trim().to_string();
        }
        if let Some(description) = update.description {
            marker.description = description;
        }
        if let Some(images) = update.images {
            marker.images = images;
        }
        if let Some(contact_info) = update.contact_info {
            marker.contact_info = contact_info;
        }
        if let Some(expires_at) = update.expires_at {
            marker.expires_at = expires_at;
        }
        if let Some(address) = update.address {
            marker.location_detail.address = Some(address);
        }

        let updated = marker.clone();
        debug!(marker_id = id, "Marker updated");
        Ok(state.with_owner(updated))
    }

    pub async fn delete(&self, id: &str, requester: &str) -> Result<Marker, StoreError> {
        let mut state = self.state.write().await;
        state.owned_marker_mut(id, requester)?;
        let removed = state
            .markers
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        info!(marker_id = id, "Marker deleted");
        Ok(removed)
    }

    /// Owner marks the sighting as handled. `resolved` is terminal.
    pub async fn resolve(&self, id: &str, requester: &str) -> Result<Marker, StoreError> {
        let mut state = self.state.write().await;
        let marker = state.owned_marker_mut(id, requester)?;
        resolve_marker(marker, Utc::now())?;
        let resolved = marker.clone();
        Ok(state.with_owner(resolved))
    }

    /// Moderator override of [`MarkerStore::resolve`], no ownership check.
    pub async fn moderator_resolve(&self, id: &str) -> Result<Marker, StoreError> {
        let mut state = self.state.write().await;
        let marker = state.marker_mut(id)?;
        resolve_marker(marker, Utc::now())?;
        let resolved = marker.clone();
        Ok(state.with_owner(resolved))
    }

    /// File a report and bump the marker's counter in one critical section.
    pub async fn report(
        &self,
        marker_id: &str,
        reporter: &str,
        reason: &str,
    ) -> Result<Report, StoreError> {
        if reason.trim().is_empty() {
            return Err(StoreError::Validation("reason must not be empty".to_string()));
        }

        let mut state = self.state.write().await;
        let marker = state.marker_mut(marker_id)?;
        marker.report_count += 1;
        let count = marker.report_count;

        let report = Report {
            id: new_id(),
            marker_id: marker_id.to_string(),
            user_id: reporter.to_string(),
            reason: reason.trim().to_string(),
            created_at: Utc::now(),
            status: ReportStatus::Pending,
        };
        state.reports.push(report.clone());

        info!(marker_id, report_count = count, "Marker reported");
        Ok(report)
    }

    // ===== Reads =====

    pub async fn find_by_id(&self, id: &str) -> Result<Marker, StoreError> {
        let state = self.state.read().await;
        let marker = state
            .markers
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(state.with_owner(marker))
    }

    /// Markers posted by a user, newest first, in any status.
    pub async fn find_by_user(&self, user_id: &str) -> Vec<Marker> {
        let state = self.state.read().await;
        let mut markers: Vec<Marker> = state
            .markers
            .values()
            .filter(|m| m.user_id == user_id)
            .map(|m| state.with_owner(m.clone()))
            .collect();
        markers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        markers
    }

    pub async fn find_active_in_area(&self, area_id: &str) -> Vec<Marker> {
        self.find_active_in_area_at(area_id, Utc::now()).await
    }

    /// Active markers in a cell that have not passed `expires_at`.
    ///
    /// Filters on time itself; the expiry sweep may not have run yet.
    pub async fn find_active_in_area_at(&self, area_id: &str, now: DateTime<Utc>) -> Vec<Marker> {
        let state = self.state.read().await;
        active_in_area(&state, area_id, now)
    }

    /// Active markers within `radius` meters, nearest first.
    pub async fn find_nearby(
        &self,
        longitude: f64,
        latitude: f64,
        radius: f64,
    ) -> Result<Vec<Marker>, StoreError> {
        if !is_valid_radius(radius) {
            return Err(StoreError::Validation(format!(
                "radius must be between 0 and {} meters",
                MAX_NEIGHBOR_RADIUS_METERS
            )));
        }
        let now = Utc::now();
        let cells = self.grid.neighbor_cell_ids(longitude, latitude, radius);

        let candidates: Vec<Marker> = {
            let state = self.state.read().await;
            cells
                .iter()
                .flat_map(|cell| active_in_area(&state, &cell.to_string(), now))
                .collect()
        };

        debug!(cells = cells.len(), candidates = candidates.len(), "Nearby candidates");
        Ok(filter_by_distance(
            candidates,
            &GeoPoint::new(longitude, latitude),
            radius,
        ))
    }

    pub async fn area(&self, area_id: &str) -> Option<Area> {
        self.state.read().await.areas.get(area_id).cloned()
    }

    pub async fn reports_for(&self, marker_id: &str) -> Vec<Report> {
        let state = self.state.read().await;
        state
            .reports
            .iter()
            .filter(|r| r.marker_id == marker_id)
            .cloned()
            .collect()
    }

    // ===== Expiry =====

    /// Flip every active marker past `expires_at` to `expired`.
    ///
    /// Expired markers stay in the store for auditing. Returns how many
    /// markers changed.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.state.write().await;
        let mut swept = 0;
        for marker in state.markers.values_mut() {
            if marker.status == MarkerStatus::Active && marker.is_expired_at(now) {
                marker.status = MarkerStatus::Expired;
                swept += 1;
            }
        }
        if swept > 0 {
            info!(count = swept, "Expired markers swept");
        }
        swept
    }

    /// Run [`MarkerStore::sweep_expired`] every `every` until cancelled.
    pub fn spawn_expiry_sweeper(
        self: &Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Expiry sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        store.sweep_expired(Utc::now()).await;
                    }
                }
            }
        })
    }
}

fn active_in_area(state: &StoreState, area_id: &str, now: DateTime<Utc>) -> Vec<Marker> {
    state
        .markers
        .values()
        .filter(|m| m.area_id == area_id && m.is_visible_at(now))
        .map(|m| state.with_owner(m.clone()))
        .collect()
}

fn validate_new(data: &NewMarker, now: DateTime<Utc>) -> Result<GeoPoint, StoreError> {
    if data.title.trim().is_empty() {
        return Err(StoreError::Validation("title must not be empty".to_string()));
    }
    let point = data
        .location()
        .ok_or_else(|| StoreError::Validation("latitude and longitude are required".to_string()))?;
    if !point.is_valid() {
        return Err(StoreError::Validation(format!(
            "coordinates out of range: ({}, {})",
            point.longitude, point.latitude
        )));
    }
    if data.expires_at <= now {
        return Err(StoreError::Validation(
            "expiresAt must be after createdAt".to_string(),
        ));
    }
    Ok(point)
}

fn resolve_marker(marker: &mut Marker, now: DateTime<Utc>) -> Result<(), StoreError> {
    let current = if marker.status == MarkerStatus::Active && marker.is_expired_at(now) {
        MarkerStatus::Expired
    } else {
        marker.status
    };
    if current != MarkerStatus::Active {
        return Err(StoreError::InvalidTransition {
            marker_id: marker.id.clone(),
            from: current,
            to: MarkerStatus::Resolved,
        });
    }
    marker.status = MarkerStatus::Resolved;
    info!(marker_id = %marker.id, "Marker resolved");
    Ok(())
}

fn new_id() -> String {
    let bytes: [u8; ID_BYTES] = rand::random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// ============================================================================
// Tests
// ============================================================================
