use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::CacheSnapshot;

/// File name of the durable cache blob inside the cache directory.
pub const MIRROR_FILE: &str = "marker_cache.json";

/// Best-effort on-disk copy of the retrieval cache.
///
/// Writes happen off the caller's task. Every write or erase bumps a
/// generation counter and a queued write only lands if it is still the
/// latest, so an erase is never undone by an older pending write.
#[derive(Debug, Clone)]
pub struct CacheMirror {
    path: Option<PathBuf>,
    generation: Arc<Mutex<u64>>,
    pending: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl CacheMirror {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            path: Some(cache_dir.join(MIRROR_FILE)),
            generation: Arc::new(Mutex::new(0)),
            pending: Arc::new(Mutex::new(None)),
        }
    }

    /// A mirror that never touches the filesystem.
    pub fn disabled() -> Self {
        Self {
            path: None,
            generation: Arc::new(Mutex::new(0)),
            pending: Arc::new(Mutex::new(None)),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read the mirrored snapshot. Missing file yields `Ok(None)`.
    pub fn load(&self) -> Result<Option<CacheSnapshot>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cache mirror: {}", path.display()))?;
        let snapshot = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache mirror: {}", path.display()))?;
        Ok(Some(snapshot))
    }

    /// Queue a write of `snapshot` without blocking the caller.
    pub fn persist(&self, snapshot: Arc<CacheSnapshot>) {
        let Some(path) = self.path.clone() else {
            return;
        };
        let generation = Arc::clone(&self.generation);
        let ticket = {
            let mut current = generation.lock().unwrap_or_else(PoisonError::into_inner);
            *current += 1;
            *current
        };

        let job = move || {
            let current = generation.lock().unwrap_or_else(PoisonError::into_inner);
            if *current != ticket {
                debug!(ticket, latest = *current, "Skipping superseded cache mirror write");
                return;
            }
            if let Err(e) = write_snapshot(&path, &snapshot) {
                warn!(error = %e, "Failed to write cache mirror");
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn_blocking(job);
                *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
            }
            Err(_) => job(),
        }
    }

    /// Wait for the most recently queued write to land.
    pub async fn flush(&self) {
        let task = self.pending.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Cache mirror write task failed");
            }
        }
    }

    /// Remove the mirrored snapshot and cancel any queued write.
    pub fn erase(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let mut current = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        *current += 1;
        if path.exists() {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(error = %e, "Failed to remove cache mirror");
            }
        }
    }
}

fn write_snapshot(path: &Path, snapshot: &CacheSnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string(snapshot)?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::testing::marker_at;

    #[test]
    fn test_persist_load_erase_without_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = CacheMirror::new(dir.path());
        let here = GeoPoint::new(116.4074, 39.9042);

        assert!(mirror.load().unwrap().is_none());

        let snapshot = Arc::new(CacheSnapshot::new(vec![marker_at("m1", here)], here));
        mirror.persist(Arc::clone(&snapshot));

        let loaded = mirror.load().unwrap().expect("snapshot should be mirrored");
        assert_eq!(loaded.markers, snapshot.markers);
        assert_eq!(loaded.query_location, here);
        assert_eq!(loaded.timestamp, snapshot.timestamp);

        mirror.erase();
        assert!(mirror.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_flush_waits_for_queued_write() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = CacheMirror::new(dir.path());
        let here = GeoPoint::new(116.4074, 39.9042);

        mirror.persist(Arc::new(CacheSnapshot::new(vec![marker_at("m1", here)], here)));
        mirror.persist(Arc::new(CacheSnapshot::new(vec![marker_at("m2", here)], here)));
        mirror.flush().await;

        // Only the latest write is guaranteed to land
        let loaded = mirror.load().unwrap().expect("snapshot should be mirrored");
        assert_eq!(loaded.markers[0].id, "m2");
    }

    #[test]
    fn test_corrupt_mirror_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MIRROR_FILE), "{not json").unwrap();
        assert!(CacheMirror::new(dir.path()).load().is_err());
    }

    #[test]
    fn test_disabled_mirror_is_inert() {
        let mirror = CacheMirror::disabled();
        let here = GeoPoint::new(0.0, 0.0);
        mirror.persist(Arc::new(CacheSnapshot::new(vec![marker_at("m1", here)], here)));
        mirror.erase();
        assert!(mirror.path().is_none());
        assert!(mirror.load().unwrap().is_none());
    }
}
