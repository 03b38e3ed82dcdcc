//! Application state for the web layer.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::cache::CachedTriasClient;
use crate::config::AppConfig;
use crate::domain::Stop;
use crate::stops::{CacheBuilder, GatewayError, StopCache, StopSource};
use crate::trias::{StopCandidate, TriasClient, TriasError};

/// Shared application state.
///
/// Contains all the services needed to handle requests.
#[derive(Clone)]
pub struct AppState {
    /// Cached TRIAS client for departure boards
    pub trias: Arc<CachedTriasClient>,

    /// In-memory stop cache serving nearby queries
    pub stops: StopCache,

    /// Background stop-cache builder
    pub builder: Arc<CacheBuilder<TriasClient>>,

    /// Server configuration
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(
        trias: CachedTriasClient,
        stops: StopCache,
        builder: CacheBuilder<TriasClient>,
        config: AppConfig,
    ) -> Self {
        Self {
            trias: Arc::new(trias),
            stops,
            builder: Arc::new(builder),
            config: Arc::new(config),
        }
    }
}

/// Cache builds source their stops from the live gateway: one name
/// search per city, geocoded results only.
impl StopSource for TriasClient {
    fn stops_for_city(
        &self,
        city: &str,
        max_results: u32,
    ) -> BoxFuture<'_, Result<Vec<Stop>, GatewayError>> {
        let city = city.to_string();
        Box::pin(async move {
            let candidates = self
                .search_stops_by_name(&city, max_results)
                .await
                .map_err(|e| match e {
                    TriasError::Timeout => GatewayError::Timeout,
                    other => GatewayError::Unavailable(other.to_string()),
                })?;

            Ok(candidates.iter().filter_map(StopCandidate::to_stop).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trias::TriasConfig;

    // The adapter itself needs a live endpoint to do anything useful;
    // here we only check that a client satisfies the trait bounds.
    #[test]
    fn trias_client_is_a_stop_source() {
        fn assert_source<S: StopSource>(_: &S) {}

        let client = TriasClient::new(TriasConfig::new()).unwrap();
        assert_source(&client);
    }
}
