//! Stop cache: geographic index, shared store and background builder.
//!
//! The cache is the authority the nearby-stop endpoint reads from. It
//! is populated by a background build that walks a configured city
//! list against the TRIAS gateway, and it tolerates partial builds:
//! whatever was ingested stays queryable, while the last-build
//! timestamp only moves when a run completes.

mod builder;
mod cache;
mod error;
mod index;

pub use builder::{
    BuildConfig, BuildPhase, BuildProgress, CacheBuilder, StopOutcome, StopSource,
};
pub use cache::{CacheStats, StopCache};
pub use error::{BuildError, CacheError, GatewayError};
pub use index::{GeoIndex, NearbyStop};
