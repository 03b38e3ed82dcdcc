//! Background cache build runner.
//!
//! A build walks a configured list of city names, searches the stop
//! source for each, and ingests whatever comes back. At most one build
//! runs per process; starting is a guarded state transition and a
//! second start is rejected while the first is live. Stopping is
//! cooperative: a stop request sets a flag that the loop checks at
//! each city boundary, so everything ingested so far stays in the
//! cache.
//!
//! The runner never holds a lock across an upstream call. Progress is
//! a plain snapshot guarded by a mutex that is only ever held for a
//! few field assignments.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::domain::Stop;

use super::cache::StopCache;
use super::error::{BuildError, GatewayError};

/// Default number of stops requested per city search.
const DEFAULT_STOPS_PER_CITY: u32 = 100;

/// Default pause between city searches, to stay polite to the
/// upstream.
const DEFAULT_THROTTLE: Duration = Duration::from_millis(500);

/// Source of stops for cache builds.
///
/// The production implementation searches the TRIAS gateway by city
/// name; tests substitute scripted sources.
pub trait StopSource: Send + Sync + 'static {
    /// Fetch up to `max_results` stops matching `city`.
    fn stops_for_city(
        &self,
        city: &str,
        max_results: u32,
    ) -> BoxFuture<'_, Result<Vec<Stop>, GatewayError>>;
}

/// Phase of the most recent build run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    /// No build has run yet.
    Idle,
    /// A build is in progress.
    Running,
    /// The last build visited every city.
    Completed,
    /// The last build was stopped on request.
    Stopped,
    /// The last build aborted.
    Failed,
}

/// Outcome of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// A running build acknowledged the request and will stop at the
    /// next city boundary.
    Stopped,
    /// No build was running.
    NotRunning,
}

/// Snapshot of build progress.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildProgress {
    pub phase: BuildPhase,
    /// 1-based index of the city being processed, 0 before the first.
    pub current: usize,
    pub total: usize,
    pub current_city: Option<String>,
}

impl BuildProgress {
    pub fn running(&self) -> bool {
        self.phase == BuildPhase::Running
    }
}

/// Configuration for build runs.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Stops requested per city search.
    pub stops_per_city: u32,

    /// Pause between city searches.
    pub throttle: Duration,
}

impl BuildConfig {
    pub fn new() -> Self {
        Self {
            stops_per_city: DEFAULT_STOPS_PER_CITY,
            throttle: DEFAULT_THROTTLE,
        }
    }

    pub fn with_stops_per_city(mut self, stops_per_city: u32) -> Self {
        self.stops_per_city = stops_per_city;
        self
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self::new()
    }
}

struct BuildState {
    phase: BuildPhase,
    current: usize,
    total: usize,
    current_city: Option<String>,
    stop_requested: bool,
}

/// Single-flight background builder for a [`StopCache`].
pub struct CacheBuilder<S> {
    source: Arc<S>,
    cache: StopCache,
    config: BuildConfig,
    state: Arc<Mutex<BuildState>>,
}

// Poisoning is recovered: every state mutation is a batch of plain
// field assignments, so a poisoned guard still holds consistent data.
fn lock(state: &Mutex<BuildState>) -> MutexGuard<'_, BuildState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<S: StopSource> CacheBuilder<S> {
    pub fn new(source: Arc<S>, cache: StopCache, config: BuildConfig) -> Self {
        Self {
            source,
            cache,
            config,
            state: Arc::new(Mutex::new(BuildState {
                phase: BuildPhase::Idle,
                current: 0,
                total: 0,
                current_city: None,
                stop_requested: false,
            })),
        }
    }

    /// Start a build over `cities`, returning as soon as the
    /// background task is spawned. A `stops_per_city` override applies
    /// to this run only; the configured value is used when absent.
    ///
    /// Fails with [`BuildError::AlreadyRunning`] while a previous
    /// build is still live; any finished build may be superseded.
    pub fn start(
        &self,
        cities: Vec<String>,
        stops_per_city: Option<u32>,
    ) -> Result<(), BuildError> {
        {
            let mut state = lock(&self.state);
            if state.phase == BuildPhase::Running {
                return Err(BuildError::AlreadyRunning);
            }
            *state = BuildState {
                phase: BuildPhase::Running,
                current: 0,
                total: cities.len(),
                current_city: None,
                stop_requested: false,
            };
        }

        let source = Arc::clone(&self.source);
        let cache = self.cache.clone();
        let config = BuildConfig {
            stops_per_city: stops_per_city.unwrap_or(self.config.stops_per_city),
            ..self.config.clone()
        };
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            let run = AssertUnwindSafe(run_build(
                source,
                cache,
                config,
                cities,
                Arc::clone(&state),
            ))
            .catch_unwind()
            .await;

            if run.is_err() {
                let mut guard = lock(&state);
                guard.phase = BuildPhase::Failed;
                guard.current_city = None;
                error!("cache build panicked");
            }
        });

        Ok(())
    }

    /// Ask a running build to stop at the next city boundary.
    pub fn request_stop(&self) -> StopOutcome {
        let mut state = lock(&self.state);
        if state.phase == BuildPhase::Running {
            state.stop_requested = true;
            StopOutcome::Stopped
        } else {
            StopOutcome::NotRunning
        }
    }

    /// Snapshot of the current build state. Never waits on the build
    /// loop.
    pub fn progress(&self) -> BuildProgress {
        let state = lock(&self.state);
        BuildProgress {
            phase: state.phase,
            current: state.current,
            total: state.total,
            current_city: state.current_city.clone(),
        }
    }
}

async fn run_build<S: StopSource>(
    source: Arc<S>,
    cache: StopCache,
    config: BuildConfig,
    cities: Vec<String>,
    state: Arc<Mutex<BuildState>>,
) {
    let total = cities.len();
    let started = Instant::now();
    info!(total, "cache build started");

    for (i, city) in cities.iter().enumerate() {
        let stop_requested = lock(&state).stop_requested;
        if stop_requested {
            let mut guard = lock(&state);
            guard.phase = BuildPhase::Stopped;
            guard.current_city = None;
            info!(processed = i, total, "cache build stopped on request");
            return;
        }

        {
            let mut guard = lock(&state);
            guard.current = i + 1;
            guard.current_city = Some(city.clone());
        }

        match source.stops_for_city(city, config.stops_per_city).await {
            Ok(stops) => {
                let fetched = stops.len();
                let cache_size = cache.ingest(stops).await;
                debug!(city = %city, fetched, cache_size, "city ingested");
            }
            Err(err) => {
                warn!(city = %city, error = %err, "city search failed, continuing");
            }
        }

        // Throttle between successive upstream calls; nothing follows
        // the last city.
        if i + 1 < total {
            tokio::time::sleep(config.throttle).await;
        }
    }

    cache.mark_build_complete(Utc::now()).await;
    let mut guard = lock(&state);
    guard.phase = BuildPhase::Completed;
    guard.current_city = None;
    info!(
        total,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "cache build complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::domain::{GeoPoint, StopId};

    /// Scripted stop source for driving the builder in tests.
    struct ScriptedSource {
        outcomes: HashMap<String, Result<Vec<Stop>, GatewayError>>,
        calls: Mutex<Vec<String>>,
        requested: Mutex<Vec<u32>>,
        delay: Duration,
        panic_on: Option<String>,
    }

    impl ScriptedSource {
        fn new(outcomes: HashMap<String, Result<Vec<Stop>, GatewayError>>) -> Self {
            Self {
                outcomes,
                calls: Mutex::new(Vec::new()),
                requested: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
                panic_on: None,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn panicking_on(mut self, city: &str) -> Self {
            self.panic_on = Some(city.to_string());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn requested(&self) -> Vec<u32> {
            self.requested.lock().unwrap().clone()
        }
    }

    impl StopSource for ScriptedSource {
        fn stops_for_city(
            &self,
            city: &str,
            max_results: u32,
        ) -> BoxFuture<'_, Result<Vec<Stop>, GatewayError>> {
            let city = city.to_string();
            Box::pin(async move {
                self.calls.lock().unwrap().push(city.clone());
                self.requested.lock().unwrap().push(max_results);
                if self.panic_on.as_deref() == Some(city.as_str()) {
                    panic!("scripted panic for {city}");
                }
                if self.delay > Duration::ZERO {
                    tokio::time::sleep(self.delay).await;
                }
                self.outcomes
                    .get(&city)
                    .cloned()
                    .unwrap_or_else(|| Ok(Vec::new()))
            })
        }
    }

    fn stop(id: &str, lat: f64, lon: f64) -> Stop {
        Stop {
            id: StopId::parse(id).unwrap(),
            name: format!("Stop {id}"),
            locality: None,
            position: GeoPoint::new(lat, lon).unwrap(),
            platform_count: 1,
        }
    }

    fn fast_config() -> BuildConfig {
        BuildConfig::new().with_throttle(Duration::from_millis(1))
    }

    fn builder_with(
        outcomes: HashMap<String, Result<Vec<Stop>, GatewayError>>,
    ) -> (Arc<ScriptedSource>, StopCache, CacheBuilder<ScriptedSource>) {
        let source = Arc::new(ScriptedSource::new(outcomes));
        let cache = StopCache::new();
        let builder = CacheBuilder::new(Arc::clone(&source), cache.clone(), fast_config());
        (source, cache, builder)
    }

    async fn wait_until_finished<S: StopSource>(builder: &CacheBuilder<S>) -> BuildProgress {
        for _ in 0..1000 {
            let progress = builder.progress();
            if progress.phase != BuildPhase::Running {
                return progress;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("build did not finish in time");
    }

    async fn wait_until_current<S: StopSource>(builder: &CacheBuilder<S>, current: usize) {
        for _ in 0..1000 {
            if builder.progress().current >= current {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("build never reached city {current}");
    }

    #[tokio::test]
    async fn build_visits_every_city_and_completes() {
        let (source, cache, builder) = builder_with(HashMap::from([
            (
                "Graz".to_string(),
                Ok(vec![
                    stop("at:46:401", 47.0707, 15.4395),
                    stop("at:46:900", 47.0710, 15.4400),
                ]),
            ),
            (
                "Leoben".to_string(),
                Ok(vec![stop("at:46:5000", 47.3765, 15.0941)]),
            ),
        ]));

        builder
            .start(vec!["Graz".to_string(), "Leoben".to_string()], None)
            .unwrap();
        let finished = wait_until_finished(&builder).await;

        assert_eq!(finished.phase, BuildPhase::Completed);
        assert_eq!(finished.current, 2);
        assert_eq!(finished.total, 2);
        assert_eq!(finished.current_city, None);
        assert_eq!(source.calls(), vec!["Graz", "Leoben"]);
        assert_eq!(
            source.requested(),
            vec![DEFAULT_STOPS_PER_CITY, DEFAULT_STOPS_PER_CITY]
        );
        assert_eq!(cache.len().await, 3);
        assert!(cache.stats().await.last_build.is_some());
    }

    #[tokio::test]
    async fn stops_per_city_override_applies_to_one_run_only() {
        let (source, _, builder) = builder_with(HashMap::new());

        builder.start(vec!["Graz".to_string()], Some(25)).unwrap();
        wait_until_finished(&builder).await;

        builder.start(vec!["Graz".to_string()], None).unwrap();
        wait_until_finished(&builder).await;

        assert_eq!(source.requested(), vec![25, DEFAULT_STOPS_PER_CITY]);
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_running() {
        let source = Arc::new(
            ScriptedSource::new(HashMap::new()).with_delay(Duration::from_millis(50)),
        );
        let cache = StopCache::new();
        let builder = CacheBuilder::new(Arc::clone(&source), cache, fast_config());

        builder.start(vec!["Graz".to_string()], None).unwrap();
        wait_until_current(&builder, 1).await;

        // The rejected start must leave the running job's progress
        // untouched, so hand it a city list of a different length.
        let before = builder.progress();
        assert_eq!(
            builder.start(
                vec!["Leoben".to_string(), "Kapfenberg".to_string()],
                Some(5)
            ),
            Err(BuildError::AlreadyRunning)
        );
        assert_eq!(builder.progress(), before);

        let finished = wait_until_finished(&builder).await;
        assert_eq!(finished.phase, BuildPhase::Completed);
        assert_eq!(finished.total, 1);

        // A finished build may be superseded.
        builder.start(vec!["Graz".to_string()], None).unwrap();
        wait_until_finished(&builder).await;
    }

    #[tokio::test]
    async fn failed_cities_are_skipped_and_build_still_completes() {
        let (source, cache, builder) = builder_with(HashMap::from([
            (
                "Graz".to_string(),
                Ok(vec![stop("at:46:401", 47.0707, 15.4395)]),
            ),
            (
                "Leoben".to_string(),
                Err(GatewayError::Unavailable("connection refused".to_string())),
            ),
            ("Kapfenberg".to_string(), Err(GatewayError::Timeout)),
            (
                "Bruck an der Mur".to_string(),
                Ok(vec![stop("at:46:6000", 47.4108, 15.2686)]),
            ),
        ]));

        builder
            .start(
                vec![
                    "Graz".to_string(),
                    "Leoben".to_string(),
                    "Kapfenberg".to_string(),
                    "Bruck an der Mur".to_string(),
                ],
                None,
            )
            .unwrap();
        let finished = wait_until_finished(&builder).await;

        assert_eq!(finished.phase, BuildPhase::Completed);
        assert_eq!(finished.current, 4);
        assert_eq!(finished.total, 4);
        assert_eq!(source.calls().len(), 4);
        assert_eq!(cache.len().await, 2);
        assert!(cache.stats().await.last_build.is_some());
    }

    #[tokio::test]
    async fn stop_request_halts_at_city_boundary_and_keeps_partial_results() {
        let source = Arc::new(
            ScriptedSource::new(HashMap::from([(
                "Graz".to_string(),
                Ok(vec![stop("at:46:401", 47.0707, 15.4395)]),
            )]))
            .with_delay(Duration::from_millis(50)),
        );
        let cache = StopCache::new();
        let builder = CacheBuilder::new(Arc::clone(&source), cache.clone(), fast_config());

        builder
            .start(
                vec![
                    "Graz".to_string(),
                    "Leoben".to_string(),
                    "Kapfenberg".to_string(),
                ],
                None,
            )
            .unwrap();

        // Stop while the first city search is in flight.
        wait_until_current(&builder, 1).await;
        assert_eq!(builder.request_stop(), StopOutcome::Stopped);

        let finished = wait_until_finished(&builder).await;
        assert_eq!(finished.phase, BuildPhase::Stopped);
        assert_eq!(finished.current_city, None);

        // The first city landed in the cache; later cities were never
        // queried and the build does not count as completed.
        assert_eq!(source.calls(), vec!["Graz"]);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.stats().await.last_build, None);
    }

    #[tokio::test]
    async fn stop_without_running_build_is_a_no_op() {
        let (_, _, builder) = builder_with(HashMap::new());
        assert_eq!(builder.request_stop(), StopOutcome::NotRunning);

        builder.start(vec![], None).unwrap();
        wait_until_finished(&builder).await;
        assert_eq!(builder.request_stop(), StopOutcome::NotRunning);
    }

    #[tokio::test]
    async fn empty_city_list_completes_immediately() {
        let (source, cache, builder) = builder_with(HashMap::new());
        builder.start(vec![], None).unwrap();

        let finished = wait_until_finished(&builder).await;
        assert_eq!(finished.phase, BuildPhase::Completed);
        assert_eq!(finished.total, 0);
        assert_eq!(finished.current, 0);
        assert!(source.calls().is_empty());
        assert!(cache.stats().await.last_build.is_some());
    }

    #[tokio::test]
    async fn progress_reports_current_city_while_running() {
        let source = Arc::new(
            ScriptedSource::new(HashMap::new()).with_delay(Duration::from_millis(50)),
        );
        let cache = StopCache::new();
        let builder = CacheBuilder::new(Arc::clone(&source), cache, fast_config());

        builder
            .start(vec!["Graz".to_string(), "Leoben".to_string()], None)
            .unwrap();
        wait_until_current(&builder, 1).await;

        let progress = builder.progress();
        assert!(progress.running());
        assert_eq!(progress.current, 1);
        assert_eq!(progress.total, 2);
        assert_eq!(progress.current_city.as_deref(), Some("Graz"));

        wait_until_finished(&builder).await;
    }

    #[tokio::test]
    async fn panic_in_source_marks_build_failed() {
        let source = Arc::new(
            ScriptedSource::new(HashMap::from([(
                "Graz".to_string(),
                Ok(vec![stop("at:46:401", 47.0707, 15.4395)]),
            )]))
            .panicking_on("Leoben"),
        );
        let cache = StopCache::new();
        let builder = CacheBuilder::new(Arc::clone(&source), cache.clone(), fast_config());

        builder
            .start(vec!["Graz".to_string(), "Leoben".to_string()], None)
            .unwrap();
        let finished = wait_until_finished(&builder).await;

        assert_eq!(finished.phase, BuildPhase::Failed);
        // Results ingested before the failure stay queryable.
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.stats().await.last_build, None);

        // A failed build may be superseded.
        builder.start(vec!["Graz".to_string()], None).unwrap();
        let finished = wait_until_finished(&builder).await;
        assert_eq!(finished.phase, BuildPhase::Completed);
    }

    #[tokio::test]
    async fn partial_results_are_queryable_while_running() {
        let source = Arc::new(
            ScriptedSource::new(HashMap::from([(
                "Graz".to_string(),
                Ok(vec![stop("at:46:401", 47.0707, 15.4395)]),
            )]))
            .with_delay(Duration::from_millis(100)),
        );
        let cache = StopCache::new();
        let builder = CacheBuilder::new(Arc::clone(&source), cache.clone(), fast_config());

        builder
            .start(vec!["Graz".to_string(), "Leoben".to_string()], None)
            .unwrap();

        // Wait for the first city to land while the second is still in
        // flight.
        for _ in 0..1000 {
            if cache.len().await > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(cache.len().await, 1);
        assert!(builder.progress().running());

        let center = GeoPoint::new(47.0707, 15.4395).unwrap();
        let found = cache.nearby(&center, 500.0, 10).await.unwrap();
        assert_eq!(found.len(), 1);

        wait_until_finished(&builder).await;
    }
}
