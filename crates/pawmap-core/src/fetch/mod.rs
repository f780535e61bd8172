//! Resilient nearby-marker retrieval.
//!
//! `ResilientFetcher` answers "markers near me" from the retrieval cache
//! when it can, and otherwise walks an ordered chain of `QueryStrategy`
//! request shapes (coarse, alternate operator, bounding box, unfiltered,
//! bare, structured search) for up to two passes. Unfiltered responses are
//! distance filtered locally. When every attempt fails the expired snapshot
//! is served at twice the radius, or a `Notice::ServiceUnavailable` is raised.

pub mod fetcher;
pub mod retry;
pub mod strategy;

pub use fetcher::{ResilientFetcher, STALE_RADIUS_FACTOR};
pub use retry::{run_with_fallback, RetryPolicy, RunOutcome, RETRY_DELAY_MS, RETRY_PASSES};
pub use strategy::{
    default_strategies, AlternateOperator, Bare, BoundingBox, Coarse, QueryStrategy,
    StructuredSearch, Unfiltered,
};
