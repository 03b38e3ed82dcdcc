//! HTTP route handlers.

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, warn};

use crate::config::{
    DEFAULT_DEPARTURE_LIMIT, DEFAULT_DEPARTURE_WINDOW_MINUTES, DEFAULT_NEARBY_LIMIT,
    DEFAULT_NEARBY_RADIUS_M, DEFAULT_SEARCH_RESULTS, DEFAULT_TRIP_RESULTS,
};
use crate::domain::{GeoPoint, Stop, StopId};
use crate::stops::{BuildError, StopOutcome};
use crate::trias::{LocationCandidate, PlaceRef, StopCandidate, TriasError};

use super::dto::*;
use super::state::AppState;

/// Candidates fetched when resolving a trip endpoint from free text.
const TRIP_RESOLVE_RESULTS: u32 = 10;

/// Create the application router.
///
/// `static_dir` is the path to the static assets directory; the index
/// page is served from `index.html` inside it.
pub fn create_router(state: AppState, static_dir: &str) -> Router {
    Router::new()
        .route_service("/", ServeFile::new(format!("{static_dir}/index.html")))
        .route("/health", get(health))
        .route("/api", get(api_info))
        .route("/api/search/location", get(search_location))
        .route("/api/search/nearby", get(search_nearby))
        .route("/api/departures", get(departures))
        .route("/api/trips", get(plan_trips))
        .route("/api/cache/stats", get(cache_stats))
        .route("/api/cache/build", post(start_cache_build))
        .route("/api/cache/build/stop", post(stop_cache_build))
        .route("/api/cache/build/progress", get(build_progress))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}

/// API information.
async fn api_info() -> Json<ApiInfoResponse> {
    let mut endpoints = BTreeMap::new();
    endpoints.insert(
        "/api/search/location".to_string(),
        "Search for stops by name".to_string(),
    );
    endpoints.insert(
        "/api/search/nearby".to_string(),
        "Search for stops near coordinates".to_string(),
    );
    endpoints.insert(
        "/api/departures".to_string(),
        "Get departures for a stop".to_string(),
    );
    endpoints.insert(
        "/api/trips".to_string(),
        "Plan trips between two places".to_string(),
    );
    endpoints.insert(
        "/api/cache/stats".to_string(),
        "Stop cache statistics".to_string(),
    );
    endpoints.insert(
        "/api/cache/build".to_string(),
        "Start a stop cache build (POST)".to_string(),
    );
    endpoints.insert(
        "/api/cache/build/stop".to_string(),
        "Stop a running cache build (POST)".to_string(),
    );
    endpoints.insert(
        "/api/cache/build/progress".to_string(),
        "Cache build progress".to_string(),
    );

    Json(ApiInfoResponse {
        name: "TRIAS API Server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints,
    })
}

/// Search for stops by name.
///
/// Results come straight from the gateway in upstream order; geocoded
/// ones are ingested into the stop cache as a side effect.
async fn search_location(
    State(state): State<AppState>,
    Query(params): Query<LocationSearchParams>,
) -> Result<Json<LocationSearchResponse>, AppError> {
    let query = params
        .q
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::BadRequest {
            message: "Query parameter \"q\" is required".to_string(),
        })?;
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_RESULTS);

    let candidates = state
        .trias
        .client()
        .search_stops_by_name(&query, limit)
        .await
        .map_err(AppError::from)?;

    let stops: Vec<Stop> = candidates.iter().filter_map(StopCandidate::to_stop).collect();
    if !stops.is_empty() {
        let ingested = state.stops.ingest(stops).await;
        debug!(query = %query, ingested, "search results ingested into stop cache");
    }

    let results: Vec<StopResult> = candidates.iter().map(StopResult::from_candidate).collect();

    Ok(Json(LocationSearchResponse {
        query,
        count: results.len(),
        results,
    }))
}

/// Search for stops near coordinates, served from the stop cache.
async fn search_nearby(
    State(state): State<AppState>,
    Query(params): Query<NearbySearchParams>,
) -> Result<Json<NearbySearchResponse>, AppError> {
    let (lat, lon) = match (params.lat, params.lon) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => {
            return Err(AppError::BadRequest {
                message: "Parameters \"lat\" and \"lon\" are required".to_string(),
            });
        }
    };
    let center = GeoPoint::new(lat, lon).map_err(|e| AppError::BadRequest {
        message: e.to_string(),
    })?;
    let radius = params.radius.unwrap_or(DEFAULT_NEARBY_RADIUS_M);
    let limit = params.limit.unwrap_or(DEFAULT_NEARBY_LIMIT);

    let mut hits = state
        .stops
        .nearby(&center, radius, limit)
        .await
        .map_err(|e| AppError::BadRequest {
            message: e.to_string(),
        })?;

    // A completely cold cache gets one live lookup so the first request
    // after startup still answers.
    if hits.is_empty() && state.stops.is_empty().await {
        seed_cache_from_gateway(&state, &center, radius, limit).await?;
        hits = state
            .stops
            .nearby(&center, radius, limit)
            .await
            .map_err(|e| AppError::BadRequest {
                message: e.to_string(),
            })?;
    }

    let results: Vec<NearbyStopResult> = hits.iter().map(NearbyStopResult::from_nearby).collect();

    Ok(Json(NearbySearchResponse {
        latitude: lat,
        longitude: lon,
        radius,
        count: results.len(),
        results,
    }))
}

/// One live geo lookup to seed an empty stop cache.
async fn seed_cache_from_gateway(
    state: &AppState,
    center: &GeoPoint,
    radius_m: f64,
    limit: usize,
) -> Result<(), AppError> {
    let candidates = state
        .trias
        .client()
        .search_stops_near(
            center,
            radius_m as u32,
            u32::try_from(limit).unwrap_or(u32::MAX),
        )
        .await
        .map_err(AppError::from)?;

    let stops: Vec<Stop> = candidates.iter().filter_map(StopCandidate::to_stop).collect();
    let ingested = state.stops.ingest(stops).await;
    debug!(ingested, "seeded empty stop cache from live lookup");

    Ok(())
}

/// Get the departure board for a stop.
async fn departures(
    State(state): State<AppState>,
    Query(params): Query<DeparturesParams>,
) -> Result<Json<DeparturesResponse>, AppError> {
    let raw_id = params
        .stop_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest {
            message: "Query parameter \"stop_id\" is required".to_string(),
        })?;
    let stop = StopId::parse(&raw_id).map_err(|e| AppError::BadRequest {
        message: e.to_string(),
    })?;

    let limit = params.limit.unwrap_or(DEFAULT_DEPARTURE_LIMIT);
    let window = params.window.unwrap_or(DEFAULT_DEPARTURE_WINDOW_MINUTES);
    let realtime = realtime_flag(params.realtime.as_deref());

    let board = state
        .trias
        .departures(&stop, limit, window, realtime)
        .await
        .map_err(AppError::from)?;

    let departures: Vec<DepartureResult> =
        board.iter().map(DepartureResult::from_departure).collect();

    Ok(Json(DeparturesResponse {
        stop_id: raw_id,
        count: departures.len(),
        realtime_enabled: realtime,
        departures,
    }))
}

/// Plan trips between two free-text places.
///
/// Both endpoints are resolved to their most probable location first,
/// then a trip request runs between the resolved places.
async fn plan_trips(
    State(state): State<AppState>,
    Query(params): Query<TripsParams>,
) -> Result<Json<TripsResponse>, AppError> {
    let from = params
        .from
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest {
            message: "Query parameter \"from\" is required".to_string(),
        })?;
    let to = params
        .to
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest {
            message: "Query parameter \"to\" is required".to_string(),
        })?;
    let limit = params.limit.unwrap_or(DEFAULT_TRIP_RESULTS).max(1);
    let realtime = realtime_flag(params.realtime.as_deref());

    let origin = resolve_place(&state, &from).await?;
    let destination = resolve_place(&state, &to).await?;

    let connections = state
        .trias
        .client()
        .plan_trips(
            &place_ref(&origin),
            &place_ref(&destination),
            limit,
            realtime,
        )
        .await
        .map_err(AppError::from)?;

    let connections: Vec<ConnectionResult> = connections
        .iter()
        .map(ConnectionResult::from_connection)
        .collect();

    Ok(Json(TripsResponse {
        from,
        to,
        origin: PlaceResult::from_candidate(&origin),
        destination: PlaceResult::from_candidate(&destination),
        count: connections.len(),
        connections,
    }))
}

/// Resolve free text to its most probable location candidate.
async fn resolve_place(state: &AppState, query: &str) -> Result<LocationCandidate, AppError> {
    let mut candidates = state
        .trias
        .client()
        .resolve_location(query, TRIP_RESOLVE_RESULTS)
        .await
        .map_err(AppError::from)?;

    if candidates.is_empty() {
        return Err(AppError::BadRequest {
            message: format!("Could not resolve location: {query}"),
        });
    }

    Ok(candidates.remove(0))
}

/// Trip endpoints prefer the stop reference when the resolver found
/// one, and fall back to raw coordinates.
fn place_ref(candidate: &LocationCandidate) -> PlaceRef {
    match &candidate.stop_ref {
        Some(id) => PlaceRef::Stop(id.clone()),
        None => PlaceRef::Position(candidate.position),
    }
}

/// Stop cache statistics.
async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    let stats = state.stops.stats().await;
    Json(CacheStatsResponse::from_stats(&stats))
}

/// Start a background cache build over the configured city list.
///
/// An optional `stops_per_city` query parameter bounds how many stops
/// each city search requests, for this run only.
async fn start_cache_build(
    State(state): State<AppState>,
    Query(params): Query<BuildStartParams>,
) -> Response {
    match state
        .builder
        .start(state.config.build_cities.clone(), params.stops_per_city)
    {
        Ok(()) => Json(BuildStatusResponse {
            status: "started".to_string(),
        })
        .into_response(),
        Err(BuildError::AlreadyRunning) => (
            StatusCode::CONFLICT,
            Json(BuildStatusResponse {
                status: "already_running".to_string(),
            }),
        )
            .into_response(),
    }
}

/// Ask a running cache build to stop at the next city boundary.
async fn stop_cache_build(State(state): State<AppState>) -> Json<BuildStatusResponse> {
    let status = match state.builder.request_stop() {
        StopOutcome::Stopped => "stopped",
        StopOutcome::NotRunning => "not_running",
    };

    Json(BuildStatusResponse {
        status: status.to_string(),
    })
}

/// Snapshot of cache build progress.
async fn build_progress(State(state): State<AppState>) -> Json<BuildProgressResponse> {
    Json(BuildProgressResponse::from_progress(&state.builder.progress()))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    Upstream { message: String },
}

impl From<TriasError> for AppError {
    fn from(e: TriasError) -> Self {
        AppError::Upstream {
            message: e.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::Upstream { message } => (StatusCode::BAD_GATEWAY, message),
        };

        warn!(status = %status, message = %message, "request failed");

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
