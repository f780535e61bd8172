//! REST API client module for the marker service.
//!
//! This module provides the `MarkerApi` seam between the client core and
//! the network, and `ApiClient`, its reqwest implementation. Nearby queries
//! are expressed as `MarkerRequest` values so the same logical query can be
//! sent in several shapes.

pub mod client;
pub mod error;
pub mod marker_api;
pub mod request;

pub use client::{decode_markers, ApiClient};
pub use error::ApiError;
pub use marker_api::MarkerApi;
pub use request::MarkerRequest;
