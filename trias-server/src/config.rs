//! Server configuration.
//!
//! Everything has a default, so the server starts with no environment
//! at all and talks to the public Styrian endpoint.

use std::net::SocketAddr;

use tracing::warn;

use crate::trias::DEFAULT_ENDPOINT;

/// Default number of results for name searches.
pub const DEFAULT_SEARCH_RESULTS: u32 = 10;

/// Default radius for nearby searches, in metres.
pub const DEFAULT_NEARBY_RADIUS_M: f64 = 500.0;

/// Default result limit for nearby searches.
pub const DEFAULT_NEARBY_LIMIT: usize = 200;

/// Default number of departures on a board.
pub const DEFAULT_DEPARTURE_LIMIT: u32 = 12;

/// Default departure window in minutes.
pub const DEFAULT_DEPARTURE_WINDOW_MINUTES: u32 = 60;

/// Default number of trip connections.
pub const DEFAULT_TRIP_RESULTS: u32 = 5;

const DEFAULT_REQUESTOR_REF: &str = "trias-server";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Cities a default cache build walks: the larger towns of the
/// network's coverage area.
const DEFAULT_BUILD_CITIES: &[&str] = &[
    "Graz",
    "Leoben",
    "Kapfenberg",
    "Bruck an der Mur",
    "Knittelfeld",
    "Judenburg",
    "Köflach",
    "Voitsberg",
    "Deutschlandsberg",
    "Leibnitz",
    "Feldbach",
    "Gleisdorf",
    "Weiz",
    "Hartberg",
    "Fürstenfeld",
    "Mürzzuschlag",
    "Liezen",
    "Schladming",
];

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// TRIAS endpoint URL (`TRIAS_ENDPOINT`).
    pub endpoint: String,

    /// Requestor reference sent upstream (`TRIAS_REQUESTOR_REF`).
    pub requestor_ref: String,

    /// HTTP bind address (`TRIAS_BIND_ADDR`).
    pub bind_addr: SocketAddr,

    /// Upstream timeout in seconds (`TRIAS_TIMEOUT_SECS`).
    pub timeout_secs: u64,

    /// Cities a cache build walks (`TRIAS_BUILD_CITIES`, comma
    /// separated).
    pub build_cities: Vec<String>,

    /// Directory holding the static web UI (`TRIAS_STATIC_DIR`).
    pub static_dir: String,
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            requestor_ref: DEFAULT_REQUESTOR_REF.to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            build_cities: DEFAULT_BUILD_CITIES.iter().map(|c| c.to_string()).collect(),
            static_dir: "static".to_string(),
        }
    }

    /// Read configuration from the environment, keeping defaults for
    /// anything unset. Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::new();

        if let Ok(endpoint) = std::env::var("TRIAS_ENDPOINT") {
            if !endpoint.is_empty() {
                config.endpoint = endpoint;
            }
        }

        if let Ok(requestor_ref) = std::env::var("TRIAS_REQUESTOR_REF") {
            if !requestor_ref.is_empty() {
                config.requestor_ref = requestor_ref;
            }
        }

        if let Ok(addr) = std::env::var("TRIAS_BIND_ADDR") {
            match addr.parse() {
                Ok(parsed) => config.bind_addr = parsed,
                Err(_) => warn!(addr = %addr, "ignoring unparseable TRIAS_BIND_ADDR"),
            }
        }

        if let Ok(secs) = std::env::var("TRIAS_TIMEOUT_SECS") {
            match secs.parse() {
                Ok(parsed) => config.timeout_secs = parsed,
                Err(_) => warn!(secs = %secs, "ignoring unparseable TRIAS_TIMEOUT_SECS"),
            }
        }

        if let Ok(cities) = std::env::var("TRIAS_BUILD_CITIES") {
            match parse_city_list(&cities) {
                Some(parsed) => config.build_cities = parsed,
                None => warn!("ignoring empty TRIAS_BUILD_CITIES"),
            }
        }

        if let Ok(dir) = std::env::var("TRIAS_STATIC_DIR") {
            if !dir.is_empty() {
                config.static_dir = dir;
            }
        }

        config
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_requestor_ref(mut self, requestor_ref: impl Into<String>) -> Self {
        self.requestor_ref = requestor_ref.into();
        self
    }

    pub fn with_bind_addr(mut self, bind_addr: SocketAddr) -> Self {
        self.bind_addr = bind_addr;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_build_cities(mut self, build_cities: Vec<String>) -> Self {
        self.build_cities = build_cities;
        self
    }

    pub fn with_static_dir(mut self, static_dir: impl Into<String>) -> Self {
        self.static_dir = static_dir.into();
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a comma-separated city list, dropping blank entries.
fn parse_city_list(raw: &str) -> Option<Vec<String>> {
    let cities: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    (!cities.is_empty()).then_some(cities)
}
