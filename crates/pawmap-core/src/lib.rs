//! Core library for pawmap: nearby stray and lost dog sightings.
//!
//! - `geo`: grid cells, haversine distance, distance filtering
//! - `store`: server-side marker storage with ownership and expiry
//! - `api`: the marker REST client
//! - `cache`: last-result snapshot with a durable mirror
//! - `fetch`: cache-first, multi-strategy nearby retrieval
//! - `service`: the facade front ends talk to

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod fetch;
pub mod geo;
pub mod models;
pub mod notice;
pub mod service;
pub mod store;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiError, MarkerApi};
pub use cache::RetrievalCache;
pub use config::Config;
pub use fetch::ResilientFetcher;
pub use geo::{GeoPoint, GridIndexer};
pub use models::{Marker, NearbyQuery};
pub use notice::Notice;
pub use service::MarkerService;
pub use store::MarkerStore;
