//! Retrieval cache for nearby marker queries.
//!
//! This module provides the `RetrievalCache`, which holds the result of the
//! last successful nearby fetch. A snapshot is served again only while it is
//! younger than 30 minutes and the user has moved less than 2 km; past that
//! it is kept around as a stale fallback for when the service is down.
//!
//! Snapshots are mirrored to `marker_cache.json` in the cache directory so a
//! restart can reuse them. Mirror failures are logged and otherwise ignored.

pub mod mirror;
pub mod retrieval;
pub mod snapshot;

pub use mirror::CacheMirror;
pub use retrieval::RetrievalCache;
pub use snapshot::{CacheSnapshot, CACHE_MAX_AGE_MINUTES, CACHE_MAX_DRIFT_METERS};
