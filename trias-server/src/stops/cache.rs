//! Shared stop cache.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::{GeoPoint, Stop, StopId};

use super::error::CacheError;
use super::index::{GeoIndex, NearbyStop};

/// Snapshot of cache statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    /// Number of distinct stops held.
    pub total_stops: usize,

    /// When the last build run completed, if any ever has.
    pub last_build: Option<DateTime<Utc>>,

    /// Age of the last completed build in hours, to one decimal place.
    pub age_hours: Option<f64>,
}

struct CacheInner {
    index: GeoIndex,
    last_build: Option<DateTime<Utc>>,
}

/// Thread-safe stop cache.
///
/// Stops become visible to readers as soon as they are ingested. The
/// last-build timestamp only moves when a build run completes, so a
/// stopped or failed run leaves its partial contents queryable without
/// claiming freshness.
#[derive(Clone)]
pub struct StopCache {
    inner: Arc<RwLock<CacheInner>>,
}

impl StopCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(CacheInner {
                index: GeoIndex::new(),
                last_build: None,
            })),
        }
    }

    /// Insert or update a batch of stops, returning the cache size
    /// afterwards. Entries with an already-known identifier are
    /// replaced.
    pub async fn ingest(&self, stops: Vec<Stop>) -> usize {
        let mut guard = self.inner.write().await;
        for stop in stops {
            guard.index.upsert(stop);
        }
        guard.index.len()
    }

    /// Record that a build run completed at `completed_at`.
    pub async fn mark_build_complete(&self, completed_at: DateTime<Utc>) {
        let mut guard = self.inner.write().await;
        guard.last_build = Some(completed_at);
    }

    /// Look up a single stop by identifier.
    pub async fn get(&self, id: &StopId) -> Option<Stop> {
        let guard = self.inner.read().await;
        guard.index.get(id).cloned()
    }

    /// Number of stops held.
    pub async fn len(&self) -> usize {
        let guard = self.inner.read().await;
        guard.index.len()
    }

    pub async fn is_empty(&self) -> bool {
        let guard = self.inner.read().await;
        guard.index.is_empty()
    }

    /// Stops within `radius_m` metres of `center`, closest first, at
    /// most `limit` entries.
    pub async fn nearby(
        &self,
        center: &GeoPoint,
        radius_m: f64,
        limit: usize,
    ) -> Result<Vec<NearbyStop>, CacheError> {
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(CacheError::InvalidRadius { radius_m });
        }
        if limit == 0 {
            return Err(CacheError::InvalidLimit);
        }

        let guard = self.inner.read().await;
        Ok(guard.index.nearest_within(center, radius_m, limit))
    }

    /// Current statistics snapshot.
    pub async fn stats(&self) -> CacheStats {
        self.stats_at(Utc::now()).await
    }

    async fn stats_at(&self, now: DateTime<Utc>) -> CacheStats {
        let guard = self.inner.read().await;
        let age_hours = guard.last_build.map(|built| {
            let hours = (now - built).num_seconds().max(0) as f64 / 3600.0;
            (hours * 10.0).round() / 10.0
        });

        CacheStats {
            total_stops: guard.index.len(),
            last_build: guard.last_build,
            age_hours,
        }
    }
}

impl Default for StopCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stop(id: &str, lat: f64, lon: f64) -> Stop {
        Stop {
            id: StopId::parse(id).unwrap(),
            name: format!("Stop {id}"),
            locality: Some("Graz".to_string()),
            position: GeoPoint::new(lat, lon).unwrap(),
            platform_count: 1,
        }
    }

    fn center() -> GeoPoint {
        GeoPoint::new(47.0707, 15.4395).unwrap()
    }

    #[tokio::test]
    async fn ingest_makes_stops_queryable() {
        let cache = StopCache::new();
        let size = cache
            .ingest(vec![
                stop("at:46:401", 47.0707, 15.4395),
                stop("at:46:900", 47.0710, 15.4400),
            ])
            .await;
        assert_eq!(size, 2);

        let found = cache.nearby(&center(), 500.0, 10).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].stop.id.as_str(), "at:46:401");
    }

    #[tokio::test]
    async fn ingest_replaces_by_identifier() {
        let cache = StopCache::new();
        cache.ingest(vec![stop("at:46:401", 47.0707, 15.4395)]).await;
        cache.ingest(vec![stop("at:46:401", 47.0710, 15.4400)]).await;

        assert_eq!(cache.len().await, 1);
        let kept = cache.get(&StopId::parse("at:46:401").unwrap()).await.unwrap();
        assert_eq!(kept.position.latitude(), 47.0710);
    }

    #[tokio::test]
    async fn ingest_does_not_claim_freshness() {
        let cache = StopCache::new();
        cache.ingest(vec![stop("at:46:401", 47.0707, 15.4395)]).await;

        let stats = cache.stats().await;
        assert_eq!(stats.total_stops, 1);
        assert_eq!(stats.last_build, None);
        assert_eq!(stats.age_hours, None);
    }

    #[tokio::test]
    async fn mark_build_complete_sets_timestamp_and_age() {
        let cache = StopCache::new();
        let built = Utc.with_ymd_and_hms(2026, 3, 5, 8, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 5, 10, 30, 0).unwrap();
        cache.mark_build_complete(built).await;

        let stats = cache.stats_at(now).await;
        assert_eq!(stats.last_build, Some(built));
        assert_eq!(stats.age_hours, Some(2.5));
    }

    #[tokio::test]
    async fn age_is_rounded_to_one_decimal() {
        let cache = StopCache::new();
        let built = Utc.with_ymd_and_hms(2026, 3, 5, 8, 0, 0).unwrap();
        // 8 minutes = 0.1333... hours.
        let now = Utc.with_ymd_and_hms(2026, 3, 5, 8, 8, 0).unwrap();
        cache.mark_build_complete(built).await;

        assert_eq!(cache.stats_at(now).await.age_hours, Some(0.1));
    }

    #[tokio::test]
    async fn nearby_rejects_bad_arguments() {
        let cache = StopCache::new();
        assert_eq!(
            cache.nearby(&center(), 0.0, 10).await.unwrap_err(),
            CacheError::InvalidRadius { radius_m: 0.0 }
        );
        assert_eq!(
            cache.nearby(&center(), -100.0, 10).await.unwrap_err(),
            CacheError::InvalidRadius { radius_m: -100.0 }
        );
        assert!(matches!(
            cache.nearby(&center(), f64::NAN, 10).await.unwrap_err(),
            CacheError::InvalidRadius { .. }
        ));
        assert_eq!(
            cache.nearby(&center(), 500.0, 0).await.unwrap_err(),
            CacheError::InvalidLimit
        );
    }

    #[tokio::test]
    async fn nearby_on_empty_cache_is_empty() {
        let cache = StopCache::new();
        assert!(cache.is_empty().await);
        assert!(cache.nearby(&center(), 500.0, 10).await.unwrap().is_empty());
    }
}
