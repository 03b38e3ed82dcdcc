//! Data transfer objects for web requests and responses.

use std::collections::BTreeMap;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::stops::{BuildProgress, CacheStats, NearbyStop};
use crate::trias::{Departure, LocationCandidate, StopCandidate, TripConnection, TripLeg};

/// Query parameters for the name search endpoint.
#[derive(Debug, Deserialize)]
pub struct LocationSearchParams {
    /// Search text (required)
    pub q: Option<String>,

    /// Maximum number of results
    pub limit: Option<u32>,
}

/// Query parameters for the nearby search endpoint.
#[derive(Debug, Deserialize)]
pub struct NearbySearchParams {
    /// Latitude in degrees (required)
    pub lat: Option<f64>,

    /// Longitude in degrees (required)
    pub lon: Option<f64>,

    /// Search radius in metres
    pub radius: Option<f64>,

    /// Maximum number of results
    pub limit: Option<usize>,
}

/// Query parameters for the departures endpoint.
#[derive(Debug, Deserialize)]
pub struct DeparturesParams {
    /// Stop reference, e.g. "at:46:7960" (required)
    pub stop_id: Option<String>,

    /// Maximum number of departures
    pub limit: Option<u32>,

    /// Time window in minutes
    pub window: Option<u32>,

    /// Include realtime data ("true"/"1"/"yes", default true)
    pub realtime: Option<String>,
}

/// Query parameters for the trip planning endpoint.
#[derive(Debug, Deserialize)]
pub struct TripsParams {
    /// Origin as free text (required)
    pub from: Option<String>,

    /// Destination as free text (required)
    pub to: Option<String>,

    /// Maximum number of connections
    pub limit: Option<u32>,

    /// Include realtime data ("true"/"1"/"yes", default true)
    pub realtime: Option<String>,
}

/// Query parameters for the cache build start endpoint.
#[derive(Debug, Deserialize)]
pub struct BuildStartParams {
    /// Stops requested per city for this run; configured default when
    /// absent
    pub stops_per_city: Option<u32>,
}

/// Interpret a realtime query flag the way the API documents it:
/// absent means on, otherwise "true", "1" and "yes" (any case) are on.
pub fn realtime_flag(raw: Option<&str>) -> bool {
    match raw {
        None => true,
        Some(s) => matches!(s.to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
    }
}

/// A stop in name-search results.
#[derive(Debug, Serialize)]
pub struct StopResult {
    /// Upstream stop reference
    pub stop_id: String,

    /// Stop name, when reported
    pub stop_name: Option<String>,

    /// Locality (city or area), when reported
    pub locality: Option<String>,

    /// Latitude in degrees, when geocoded
    pub latitude: Option<f64>,

    /// Longitude in degrees, when geocoded
    pub longitude: Option<f64>,

    /// Platform-level entries collapsed into this result
    pub platform_count: u32,
}

/// Response for the name search endpoint.
#[derive(Debug, Serialize)]
pub struct LocationSearchResponse {
    /// Echo of the search text
    pub query: String,

    /// Number of results
    pub count: usize,

    /// Matching stops, upstream order
    pub results: Vec<StopResult>,
}

/// A stop in nearby-search results.
#[derive(Debug, Serialize)]
pub struct NearbyStopResult {
    /// Upstream stop reference
    pub stop_id: String,

    /// Stop name
    pub stop_name: String,

    /// Locality (city or area), when known
    pub locality: Option<String>,

    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,

    /// Platform-level entries collapsed into this stop
    pub platform_count: u32,

    /// Distance from the query point in metres, one decimal
    pub distance_m: f64,
}

/// Response for the nearby search endpoint.
#[derive(Debug, Serialize)]
pub struct NearbySearchResponse {
    /// Echo of the query latitude
    pub latitude: f64,

    /// Echo of the query longitude
    pub longitude: f64,

    /// Echo of the query radius in metres
    pub radius: f64,

    /// Number of results
    pub count: usize,

    /// Stops within the radius, closest first
    pub results: Vec<NearbyStopResult>,
}

/// A single departure on a board.
#[derive(Debug, Serialize)]
pub struct DepartureResult {
    /// Published line name, e.g. "1"
    pub line: Option<String>,

    /// Destination text
    pub destination: Option<String>,

    /// Transport mode, e.g. "tram"
    pub mode: Option<String>,

    /// Timetabled departure time (ISO-8601)
    pub planned_time: Option<String>,

    /// Estimated departure time when realtime data is present
    pub estimated_time: Option<String>,

    /// Estimated time if present, timetabled otherwise
    pub actual_time: Option<String>,

    /// Delay in whole minutes, when both times parse
    pub delay_minutes: Option<i64>,

    /// Whether realtime data was present
    pub has_realtime: bool,
}

/// Response for the departures endpoint.
#[derive(Debug, Serialize)]
pub struct DeparturesResponse {
    /// Echo of the stop reference
    pub stop_id: String,

    /// Number of departures
    pub count: usize,

    /// Whether realtime data was requested
    pub realtime_enabled: bool,

    /// Departures, upstream order
    pub departures: Vec<DepartureResult>,
}

/// A resolved trip endpoint.
#[derive(Debug, Serialize)]
pub struct PlaceResult {
    /// Display name of the best match
    pub display: String,

    /// Stop reference, when the match is a stop
    pub stop_id: Option<String>,

    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,
}

/// One leg of a connection.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LegResult {
    Timed(TimedLegResult),
    Walk(WalkLegResult),
}

/// A leg on a timetabled service.
#[derive(Debug, Serialize)]
pub struct TimedLegResult {
    /// Transport mode, e.g. "bus"
    pub mode: String,

    /// Published line name
    pub line: String,

    /// Direction text, when reported
    pub headsign: Option<String>,

    /// Boarding stop name
    pub from: String,

    /// Alighting stop name
    pub to: String,

    /// Departure time (HH:MM:SS)
    pub departure: String,

    /// Arrival time (HH:MM:SS)
    pub arrival: String,
}

/// A walking leg.
#[derive(Debug, Serialize)]
pub struct WalkLegResult {
    /// Start name or coordinate text
    pub from: String,

    /// End name or coordinate text
    pub to: String,

    /// Departure time (HH:MM:SS)
    pub departure: String,

    /// Arrival time (HH:MM:SS)
    pub arrival: String,
}

/// A door-to-door connection.
#[derive(Debug, Serialize)]
pub struct ConnectionResult {
    /// Start time (HH:MM:SS)
    pub start: String,

    /// End time (HH:MM:SS)
    pub end: String,

    /// Legs in travel order
    pub legs: Vec<LegResult>,
}

/// Response for the trip planning endpoint.
#[derive(Debug, Serialize)]
pub struct TripsResponse {
    /// Echo of the origin text
    pub from: String,

    /// Echo of the destination text
    pub to: String,

    /// Resolved origin
    pub origin: PlaceResult,

    /// Resolved destination
    pub destination: PlaceResult,

    /// Number of connections
    pub count: usize,

    /// Connections, upstream order
    pub connections: Vec<ConnectionResult>,
}

/// Response for the cache statistics endpoint.
#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    /// Stops currently cached
    pub total_stops: usize,

    /// Completion time of the last full build (ISO-8601)
    pub last_build: Option<String>,

    /// Hours since the last full build, one decimal
    pub age_hours: Option<f64>,
}

/// Response for the build start/stop endpoints.
#[derive(Debug, Serialize)]
pub struct BuildStatusResponse {
    /// "started", "already_running", "stopped" or "not_running"
    pub status: String,
}

/// Response for the build progress endpoint.
#[derive(Debug, Serialize)]
pub struct BuildProgressResponse {
    /// Whether a build is in progress
    pub running: bool,

    /// 1-based index of the city being processed, 0 before the first
    pub current: usize,

    /// Number of cities in the run
    pub total: usize,

    /// Name of the city being processed
    pub current_city: Option<String>,
}

/// Response for the health endpoint.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "ok"
    pub status: String,
}

/// Response for the API info endpoint.
#[derive(Debug, Serialize)]
pub struct ApiInfoResponse {
    /// Service name
    pub name: String,

    /// API version
    pub version: String,

    /// Endpoint paths and their descriptions
    pub endpoints: BTreeMap<String, String>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

// Conversion implementations

impl StopResult {
    /// Create from a gateway candidate.
    pub fn from_candidate(candidate: &StopCandidate) -> Self {
        Self {
            stop_id: candidate.stop_id.clone(),
            stop_name: candidate.stop_name.clone(),
            locality: candidate.locality.clone(),
            latitude: candidate.latitude,
            longitude: candidate.longitude,
            platform_count: candidate.platform_count,
        }
    }
}

impl NearbyStopResult {
    /// Create from a cache query hit.
    pub fn from_nearby(hit: &NearbyStop) -> Self {
        Self {
            stop_id: hit.stop.id.to_string(),
            stop_name: hit.stop.name.clone(),
            locality: hit.stop.locality.clone(),
            latitude: hit.stop.position.latitude(),
            longitude: hit.stop.position.longitude(),
            platform_count: hit.stop.platform_count,
            distance_m: round_metres(hit.distance_m),
        }
    }
}

impl DepartureResult {
    /// Create from a gateway departure.
    pub fn from_departure(departure: &Departure) -> Self {
        Self {
            line: departure.line.clone(),
            destination: departure.destination.clone(),
            mode: departure.mode.clone(),
            planned_time: departure.planned_time.clone(),
            estimated_time: departure.estimated_time.clone(),
            actual_time: departure.actual_time.clone(),
            delay_minutes: departure.delay_minutes,
            has_realtime: departure.has_realtime,
        }
    }
}

impl PlaceResult {
    /// Create from a resolved location candidate.
    pub fn from_candidate(candidate: &LocationCandidate) -> Self {
        Self {
            display: candidate.display.clone(),
            stop_id: candidate.stop_ref.as_ref().map(|r| r.to_string()),
            latitude: candidate.position.latitude(),
            longitude: candidate.position.longitude(),
        }
    }
}

impl ConnectionResult {
    /// Create from a gateway connection.
    pub fn from_connection(connection: &TripConnection) -> Self {
        let legs = connection
            .legs
            .iter()
            .map(|leg| match leg {
                TripLeg::Timed(timed) => LegResult::Timed(TimedLegResult {
                    mode: timed.mode.clone(),
                    line: timed.line.clone(),
                    headsign: timed.headsign.clone(),
                    from: timed.from.clone(),
                    to: timed.to.clone(),
                    departure: timed.departure.clone(),
                    arrival: timed.arrival.clone(),
                }),
                TripLeg::Continuous(walk) => LegResult::Walk(WalkLegResult {
                    from: walk.from.clone(),
                    to: walk.to.clone(),
                    departure: walk.departure.clone(),
                    arrival: walk.arrival.clone(),
                }),
            })
            .collect();

        Self {
            start: connection.start_time.clone(),
            end: connection.end_time.clone(),
            legs,
        }
    }
}

impl CacheStatsResponse {
    /// Create from a cache statistics snapshot.
    pub fn from_stats(stats: &CacheStats) -> Self {
        Self {
            total_stops: stats.total_stops,
            last_build: stats
                .last_build
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            age_hours: stats.age_hours,
        }
    }
}

impl BuildProgressResponse {
    /// Create from a builder progress snapshot.
    pub fn from_progress(progress: &BuildProgress) -> Self {
        Self {
            running: progress.running(),
            current: progress.current,
            total: progress.total,
            current_city: progress.current_city.clone(),
        }
    }
}

/// Round a distance to one decimal place for display.
fn round_metres(distance: f64) -> f64 {
    (distance * 10.0).round() / 10.0
}
