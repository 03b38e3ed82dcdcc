//! Caching layer for TRIAS departure boards.
//!
//! Departure data goes stale within a minute, so entries live for a
//! short TTL. The cache key carries every request parameter; two
//! queries that differ only in window length or realtime flag never
//! share an entry.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache as MokaCache;

use crate::domain::StopId;
use crate::trias::{Departure, TriasClient, TriasError};

/// Cache key: (stop, max results, window minutes, realtime flag).
type BoardKey = (StopId, u32, u32, bool);

/// Cached departure board entry.
type BoardEntry = Arc<Vec<Departure>>;

/// Configuration for the departure cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for cached entries.
    pub ttl: Duration,

    /// Maximum number of cached entries.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            max_capacity: 1000,
        }
    }
}

/// TRIAS client with departure board caching.
///
/// Wraps a [`TriasClient`] and caches departure boards. Location
/// search and trip planning pass straight through to the client.
pub struct CachedTriasClient {
    client: TriasClient,
    boards: MokaCache<BoardKey, BoardEntry>,
}

impl CachedTriasClient {
    /// Create a new cached client.
    pub fn new(client: TriasClient, config: &CacheConfig) -> Self {
        let boards = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();

        Self { client, boards }
    }

    /// Departure board for a stop, cached per full parameter tuple.
    pub async fn departures(
        &self,
        stop: &StopId,
        max_results: u32,
        window_minutes: u32,
        include_realtime: bool,
    ) -> Result<BoardEntry, TriasError> {
        let key = (stop.clone(), max_results, window_minutes, include_realtime);

        if let Some(cached) = self.boards.get(&key).await {
            return Ok(cached);
        }

        let departures = self
            .client
            .departures(stop, max_results, window_minutes, include_realtime)
            .await?;

        let entry = Arc::new(departures);
        self.boards.insert(key, entry.clone()).await;

        Ok(entry)
    }

    /// Access the underlying client for operations that bypass the
    /// cache.
    pub fn client(&self) -> &TriasClient {
        &self.client
    }

    /// Number of live cache entries (for monitoring).
    pub fn entry_count(&self) -> u64 {
        self.boards.entry_count()
    }

    /// Invalidate all cached entries.
    pub fn invalidate_all(&self) {
        self.boards.invalidate_all();
    }
}
