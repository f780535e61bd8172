use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::geo::GeoPoint;
use crate::models::Marker;

use super::{CacheMirror, CacheSnapshot};

#[derive(Default)]
struct CacheState {
    snapshot: Option<Arc<CacheSnapshot>>,
    /// Fetches at or below this sequence number may no longer commit: either
    /// a later fetch already did, or the cache was cleared after they began.
    committed_seq: u64,
}

/// Snapshot of the last successful nearby fetch.
///
/// Cloning yields another handle to the same cache. Readers get an
/// immutable `Arc<CacheSnapshot>`; writers swap the whole snapshot.
#[derive(Clone)]
pub struct RetrievalCache {
    state: Arc<RwLock<CacheState>>,
    issued_seq: Arc<AtomicU64>,
    mirror: CacheMirror,
}

impl RetrievalCache {
    pub fn new(mirror: CacheMirror) -> Self {
        Self {
            state: Arc::new(RwLock::new(CacheState::default())),
            issued_seq: Arc::new(AtomicU64::new(0)),
            mirror,
        }
    }

    /// Cache without a durable mirror.
    pub fn in_memory() -> Self {
        Self::new(CacheMirror::disabled())
    }

    /// Start from whatever the mirror holds. Any read failure yields an
    /// empty cache.
    pub async fn restore(mirror: CacheMirror) -> Self {
        let cache = Self::new(mirror);
        let reader = cache.mirror.clone();
        match tokio::task::spawn_blocking(move || reader.load()).await {
            Ok(Ok(Some(snapshot))) => {
                debug!(
                    count = snapshot.markers.len(),
                    age = %snapshot.age_display(),
                    "Restored marker cache"
                );
                cache.write_state().snapshot = Some(Arc::new(snapshot));
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "Ignoring unreadable marker cache");
            }
            Err(e) => {
                warn!(error = %e, "Marker cache restore task failed");
            }
        }
        cache
    }

    /// Sequence number for a new fetch. Later calls get larger numbers.
    pub fn issue_seq(&self) -> u64 {
        self.issued_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Option<Arc<CacheSnapshot>> {
        self.read_state().snapshot.clone()
    }

    pub fn is_valid(&self, location: &GeoPoint) -> bool {
        self.is_valid_at(location, Utc::now())
    }

    pub fn is_valid_at(&self, location: &GeoPoint, now: DateTime<Utc>) -> bool {
        self.valid_snapshot_at(location, now).is_some()
    }

    /// The current snapshot if it may be served for `location` at `now`.
    pub fn valid_snapshot_at(
        &self,
        location: &GeoPoint,
        now: DateTime<Utc>,
    ) -> Option<Arc<CacheSnapshot>> {
        self.snapshot()
            .filter(|snapshot| snapshot.is_valid_at(location, now))
    }

    /// Overwrite the snapshot (last write wins). Empty results are not
    /// cached.
    pub fn replace(&self, markers: Vec<Marker>, query_location: GeoPoint) {
        if markers.is_empty() {
            return;
        }
        let snapshot = Arc::new(CacheSnapshot::new(markers, query_location));
        self.write_state().snapshot = Some(Arc::clone(&snapshot));
        self.mirror.persist(snapshot);
    }

    /// Overwrite the snapshot unless a later-issued fetch already did, or
    /// the cache was cleared after `seq` was issued.
    ///
    /// Returns `false` when the write was discarded as stale.
    pub fn replace_if_newer(&self, seq: u64, markers: Vec<Marker>, query_location: GeoPoint) -> bool {
        let snapshot = {
            let mut state = self.write_state();
            if seq <= state.committed_seq {
                debug!(seq, committed = state.committed_seq, "Discarding stale fetch result");
                return false;
            }
            if markers.is_empty() {
                return true;
            }
            let snapshot = Arc::new(CacheSnapshot::new(markers, query_location));
            state.snapshot = Some(Arc::clone(&snapshot));
            state.committed_seq = seq;
            snapshot
        };
        self.mirror.persist(snapshot);
        true
    }

    #[cfg(test)]
    pub(crate) fn install(&self, snapshot: CacheSnapshot) {
        self.write_state().snapshot = Some(Arc::new(snapshot));
    }

    /// Wait for the pending mirror write, if any.
    pub async fn flush(&self) {
        self.mirror.flush().await;
    }

    /// Drop the snapshot in memory and on disk. Fetches already in flight
    /// will not write it back.
    pub fn clear(&self) {
        {
            let mut state = self.write_state();
            state.snapshot = None;
            let issued = self.issued_seq.load(Ordering::SeqCst);
            state.committed_seq = state.committed_seq.max(issued);
        }
        self.mirror.erase();
        debug!("Marker cache cleared");
    }
}
