//! Server-side marker storage.
//!
//! `MarkerStore` holds markers bucketed by grid cell together with their
//! areas and reports. It backs the "nearby markers" endpoints and enforces
//! ownership on edits. Expiry is a soft status flip performed by a
//! background sweep; reads filter on `expires_at` on their own.

pub mod error;
pub mod memory;

pub use error::StoreError;
pub use memory::MarkerStore;
