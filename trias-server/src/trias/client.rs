//! Low-level TRIAS gateway client.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::header;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::domain::{GeoPoint, StopId};
use crate::trias::error::TriasError;
use crate::trias::types::{Departure, LocationCandidate, PlaceRef, StopCandidate, TripConnection};
use crate::trias::{parse, request};

/// Styrian open-data TRIAS endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://ogdtrias.verbundlinie.at:8183/stv/trias";

const DEFAULT_REQUESTOR_REF: &str = "trias-server";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;

/// Upstream error bodies are truncated to this many characters when
/// quoted in an error.
const ERROR_BODY_LIMIT: usize = 500;

/// Configuration for the TRIAS client.
#[derive(Debug, Clone)]
pub struct TriasConfig {
    /// Endpoint URL for the TRIAS service.
    pub endpoint: String,

    /// Requestor reference sent with every request.
    pub requestor_ref: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Maximum number of concurrent upstream requests.
    pub max_concurrent_requests: usize,
}

impl TriasConfig {
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            requestor_ref: DEFAULT_REQUESTOR_REF.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_requestor_ref(mut self, requestor_ref: impl Into<String>) -> Self {
        self.requestor_ref = requestor_ref.into();
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = max;
        self
    }
}

impl Default for TriasConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Client for the TRIAS API.
///
/// Every operation POSTs an XML request document to a single endpoint.
/// A semaphore bounds concurrent requests so that a cache build or a
/// burst of traffic cannot flood the upstream.
#[derive(Debug, Clone)]
pub struct TriasClient {
    config: TriasConfig,
    http: reqwest::Client,
    semaphore: Arc<Semaphore>,
}

impl TriasClient {
    /// Create a new client from configuration.
    pub fn new(config: TriasConfig) -> Result<Self, TriasError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(TriasError::Http)?;
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_requests));

        Ok(Self {
            config,
            http,
            semaphore,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// POST a request document and return the raw response body.
    async fn exchange(&self, body: String) -> Result<String, TriasError> {
        let _permit = self.semaphore.acquire().await.map_err(|_| TriasError::Api {
            status: 0,
            message: "semaphore closed".to_string(),
        })?;

        debug!(endpoint = %self.config.endpoint, bytes = body.len(), "TRIAS request");

        let response = self
            .http
            .post(&self.config.endpoint)
            .header(header::CONTENT_TYPE, "text/xml")
            .header(header::ACCEPT, "text/xml")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TriasError::Api {
                status: status.as_u16(),
                message: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        Ok(response.text().await?)
    }

    /// Search stops by name.
    pub async fn search_stops_by_name(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<StopCandidate>, TriasError> {
        let body =
            request::location_search(&self.config.requestor_ref, query, max_results, Utc::now());
        let xml = self.exchange(body).await?;
        parse::location_results(&xml)
    }

    /// Search stops within `radius_m` metres of a point.
    pub async fn search_stops_near(
        &self,
        center: &GeoPoint,
        radius_m: u32,
        max_results: u32,
    ) -> Result<Vec<StopCandidate>, TriasError> {
        let body = request::stops_near(
            &self.config.requestor_ref,
            center,
            radius_m,
            max_results,
            Utc::now(),
        );
        let xml = self.exchange(body).await?;
        parse::location_results(&xml)
    }

    /// Departure board for a single stop.
    pub async fn departures(
        &self,
        stop: &StopId,
        max_results: u32,
        window_minutes: u32,
        include_realtime: bool,
    ) -> Result<Vec<Departure>, TriasError> {
        let body = request::stop_events(
            &self.config.requestor_ref,
            stop,
            max_results,
            window_minutes,
            include_realtime,
            Utc::now(),
        );
        let xml = self.exchange(body).await?;
        parse::departures(&xml)
    }

    /// Resolve free text (a stop name, address or point of interest) to
    /// ranked location candidates, best match first.
    pub async fn resolve_location(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<LocationCandidate>, TriasError> {
        let body =
            request::location_resolve(&self.config.requestor_ref, query, max_results, Utc::now());
        let xml = self.exchange(body).await?;
        parse::location_candidates(&xml)
    }

    /// Plan trips between two places, departing now.
    pub async fn plan_trips(
        &self,
        origin: &PlaceRef,
        destination: &PlaceRef,
        max_results: u32,
        include_realtime: bool,
    ) -> Result<Vec<TripConnection>, TriasError> {
        let now = Utc::now();
        let body = request::trip(
            &self.config.requestor_ref,
            origin,
            destination,
            max_results,
            include_realtime,
            now,
            now,
        );
        let xml = self.exchange(body).await?;
        parse::trips(&xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = TriasConfig::new();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.requestor_ref, "trias-server");
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.max_concurrent_requests, 4);
    }

    #[test]
    fn config_builders() {
        let config = TriasConfig::new()
            .with_endpoint("http://localhost:9000/trias")
            .with_requestor_ref("my-ref")
            .with_timeout_secs(5)
            .with_max_concurrent_requests(2);
        assert_eq!(config.endpoint, "http://localhost:9000/trias");
        assert_eq!(config.requestor_ref, "my-ref");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.max_concurrent_requests, 2);
    }

    #[test]
    fn client_construction() {
        let client = TriasClient::new(TriasConfig::new()).unwrap();
        assert_eq!(client.endpoint(), DEFAULT_ENDPOINT);
    }
}
