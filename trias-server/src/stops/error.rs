//! Stop cache error types.

/// Errors from read operations on the stop cache.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CacheError {
    /// The search radius must be a positive number of metres.
    #[error("invalid radius {radius_m}: must be a positive number of metres")]
    InvalidRadius { radius_m: f64 },

    /// The result limit must be at least one.
    #[error("invalid limit: must be at least one")]
    InvalidLimit,
}

/// Errors from the stop source feeding a cache build.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    /// The upstream could not be reached or answered with an error.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    /// The upstream request timed out.
    #[error("gateway request timed out")]
    Timeout,
}

/// Errors starting a cache build.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    /// At most one build may run at a time.
    #[error("a cache build is already running")]
    AlreadyRunning,
}
