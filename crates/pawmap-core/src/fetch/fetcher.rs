use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::MarkerApi;
use crate::cache::RetrievalCache;
use crate::geo::filter_by_distance;
use crate::models::{Marker, NearbyQuery};
use crate::notice::{Notice, Notifier};

use super::{default_strategies, run_with_fallback, QueryStrategy, RetryPolicy, RunOutcome};

/// Radius multiplier applied when serving an expired snapshot.
pub const STALE_RADIUS_FACTOR: f64 = 2.0;

/// Read path for "markers near me". Never fails: a fetch resolves to the
/// freshest markers it can find, possibly none.
pub struct ResilientFetcher {
    api: Arc<dyn MarkerApi>,
    cache: RetrievalCache,
    strategies: Vec<Box<dyn QueryStrategy>>,
    policy: RetryPolicy,
    notifier: Notifier,
}

impl ResilientFetcher {
    pub fn new(api: Arc<dyn MarkerApi>, cache: RetrievalCache, notifier: Notifier) -> Self {
        Self {
            api,
            cache,
            strategies: default_strategies(),
            policy: RetryPolicy::default(),
            notifier,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<Box<dyn QueryStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn cache(&self) -> &RetrievalCache {
        &self.cache
    }

    pub async fn fetch(&self, query: &NearbyQuery) -> Vec<Marker> {
        self.fetch_with_cancel(query, &CancellationToken::new()).await
    }

    /// Fetch markers within `query.radius` of the query point.
    ///
    /// Order of preference: a fresh cached snapshot, the first strategy that
    /// answers, then the expired snapshot at twice the radius. A cancelled
    /// fetch returns nothing and leaves the cache alone.
    pub async fn fetch_with_cancel(
        &self,
        query: &NearbyQuery,
        cancel: &CancellationToken,
    ) -> Vec<Marker> {
        let seq = self.cache.issue_seq();
        let location = query.location();

        if let Some(snapshot) = self.cache.valid_snapshot_at(&location, Utc::now()) {
            debug!(seq, age = %snapshot.age_display(), "Serving nearby markers from cache");
            return filter_by_distance(snapshot.markers.iter().cloned(), &location, query.radius);
        }

        let api = &self.api;
        let outcome = run_with_fallback(&self.strategies, &self.policy, cancel, |_, strategy| {
            let request = strategy.request(query);
            async move { api.query(&request).await }
        })
        .await;

        match outcome {
            RunOutcome::Success {
                strategy_index,
                value,
            } => {
                let strategy = &self.strategies[strategy_index];
                let markers = if strategy.filters_client_side() {
                    filter_by_distance(value, &location, query.radius)
                } else {
                    value
                };
                info!(
                    seq,
                    strategy = strategy.name(),
                    count = markers.len(),
                    "Fetched nearby markers"
                );
                self.cache.replace_if_newer(seq, markers.clone(), location);
                markers
            }
            RunOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                warn!(
                    seq,
                    attempts,
                    last_error = ?last_error,
                    "All query strategies failed"
                );
                self.stale_fallback(query)
            }
            RunOutcome::Cancelled => {
                debug!(seq, "Nearby fetch cancelled");
                Vec::new()
            }
        }
    }

    fn stale_fallback(&self, query: &NearbyQuery) -> Vec<Marker> {
        let markers = match self.cache.snapshot() {
            Some(snapshot) => filter_by_distance(
                snapshot.markers.iter().cloned(),
                &query.location(),
                query.radius * STALE_RADIUS_FACTOR,
            ),
            None => Vec::new(),
        };

        if markers.is_empty() {
            self.notifier.emit(Notice::ServiceUnavailable);
        } else {
            self.notifier.emit(Notice::StaleData {
                count: markers.len(),
            });
        }
        markers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::request::{ALL_MARKERS_PATH, MARKERS_PATH};
    use crate::api::MarkerRequest;
    use crate::cache::CacheSnapshot;
    use crate::geo::{destination, GeoPoint};
    use crate::testing::{marker_at, FakeApi};
    use chrono::Duration;

    const HERE: GeoPoint = GeoPoint {
        longitude: 116.4074,
        latitude: 39.9042,
    };

    fn ring(distances: &[f64]) -> Vec<Marker> {
        distances
            .iter()
            .enumerate()
            .map(|(i, d)| marker_at(&format!("m{}", i), destination(&HERE, 90.0, *d)))
            .collect()
    }

    fn fetcher(api: &Arc<FakeApi>) -> ResilientFetcher {
        let api: Arc<dyn MarkerApi> = api.clone();
        ResilientFetcher::new(api, RetrievalCache::in_memory(), Notifier::new())
    }

    fn query(radius: f64) -> NearbyQuery {
        NearbyQuery::at(HERE).with_radius(radius)
    }

    #[tokio::test(start_paused = true)]
    async fn test_twelve_failures_resolve_to_empty() {
        let api = Arc::new(FakeApi::failing());
        let fetcher = fetcher(&api);
        let mut notices = fetcher.notifier.subscribe();

        let markers = fetcher.fetch(&query(1000.0)).await;

        assert!(markers.is_empty());
        assert_eq!(api.call_count(), 12);
        assert_eq!(notices.recv().await.unwrap(), Notice::ServiceUnavailable);
        assert!(fetcher.cache().snapshot().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_coarse_success_populates_cache() {
        let api = Arc::new(FakeApi::serving(ring(&[100.0, 400.0])));
        let fetcher = fetcher(&api);

        let markers = fetcher.fetch(&query(1000.0)).await;

        assert_eq!(markers.len(), 2);
        assert_eq!(api.calls()[0].path(), MARKERS_PATH);
        assert_eq!(api.calls()[0].param_value("radius"), Some("1000"));
        let snapshot = fetcher.cache().snapshot().unwrap();
        assert_eq!(snapshot.query_location, HERE);
        assert_eq!(snapshot.markers.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unfiltered_strategy_is_filtered_locally() {
        let api = Arc::new(
            FakeApi::serving(ring(&[1500.0, 200.0, 900.0, 8000.0]))
                .succeed_when(|_, request| request.path() == ALL_MARKERS_PATH),
        );
        let fetcher = fetcher(&api);

        let markers = fetcher.fetch(&query(1000.0)).await;

        let ids: Vec<&str> = markers.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
        assert!(markers.iter().all(|m| m.distance.is_some()));
        // coarse, geo-within and bounding-box failed first
        assert_eq!(api.call_count(), 4);
        assert_eq!(api.calls()[3], MarkerRequest::get(ALL_MARKERS_PATH));
    }

    #[tokio::test(start_paused = true)]
    async fn test_nearby_fetch_reuses_cache() {
        let api = Arc::new(FakeApi::serving(ring(&[100.0, 800.0, 1400.0])));
        let fetcher = fetcher(&api);

        fetcher.fetch(&query(5000.0)).await;
        assert_eq!(api.call_count(), 1);

        // Age the snapshot by a minute
        let snapshot = fetcher.cache().snapshot().unwrap();
        fetcher.cache().install(CacheSnapshot::taken_at(
            snapshot.markers.clone(),
            snapshot.query_location,
            snapshot.timestamp - Duration::seconds(60),
        ));

        let moved = destination(&HERE, 270.0, 500.0);
        let markers = fetcher
            .fetch(&NearbyQuery::at(moved).with_radius(1000.0))
            .await;

        assert_eq!(api.call_count(), 1);
        let ids: Vec<&str> = markers.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m0"]);
        assert!((markers[0].distance.unwrap() - 600.0).abs() < 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_snapshot_served_at_double_radius() {
        let api = Arc::new(FakeApi::failing());
        let fetcher = fetcher(&api);
        let mut notices = fetcher.notifier.subscribe();
        fetcher.cache().install(CacheSnapshot::taken_at(
            ring(&[300.0, 1200.0, 1800.0]),
            HERE,
            Utc::now() - Duration::minutes(40),
        ));

        let markers = fetcher.fetch(&query(1000.0)).await;

        assert_eq!(api.call_count(), 12);
        assert_eq!(markers.len(), 3);
        assert_eq!(notices.recv().await.unwrap(), Notice::StaleData { count: 3 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_snapshot_out_of_range_is_unavailable() {
        let api = Arc::new(FakeApi::failing());
        let fetcher = fetcher(&api);
        let mut notices = fetcher.notifier.subscribe();
        fetcher.cache().install(CacheSnapshot::taken_at(
            ring(&[5000.0]),
            HERE,
            Utc::now() - Duration::minutes(40),
        ));

        assert!(fetcher.fetch(&query(1000.0)).await.is_empty());
        assert_eq!(notices.recv().await.unwrap(), Notice::ServiceUnavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_fetch_leaves_cache_alone() {
        let api = Arc::new(FakeApi::failing());
        let fetcher = fetcher(&api);
        let mut notices = fetcher.notifier.subscribe();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let markers = fetcher.fetch_with_cancel(&query(1000.0), &cancel).await;

        assert!(markers.is_empty());
        assert!(fetcher.cache().snapshot().is_none());
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_older_fetch_cannot_overwrite_newer_snapshot() {
        // First request of the slow fetch fails, so it finishes second
        let api = Arc::new(
            FakeApi::serving(ring(&[100.0])).succeed_when(|attempt, _| attempt != 0),
        );
        let fetcher = Arc::new(fetcher(&api));
        let elsewhere = destination(&HERE, 0.0, 10_000.0);

        let slow = {
            let fetcher = Arc::clone(&fetcher);
            tokio::spawn(async move { fetcher.fetch(&NearbyQuery::at(elsewhere)).await })
        };
        tokio::task::yield_now().await;
        let fast = fetcher.fetch(&query(1000.0)).await;
        let slow = slow.await.unwrap();

        assert_eq!(fast.len(), 1);
        assert_eq!(slow.len(), 1);
        assert_eq!(fetcher.cache().snapshot().unwrap().query_location, HERE);
    }
}
