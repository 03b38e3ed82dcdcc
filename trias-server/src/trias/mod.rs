//! TRIAS (VDV-431) gateway client.
//!
//! This module provides an HTTP client for a TRIAS 1.2 endpoint, the
//! standardised traveller information API used by Austrian and German
//! transit authorities.
//!
//! Key characteristics of TRIAS:
//! - All operations POST an XML request document to a single endpoint
//! - Responses report one `LocationResult` per **platform**; entries
//!   sharing a stop reference are collapsed during parsing
//! - Timestamps are ISO-8601; realtime times appear as `EstimatedTime`
//!   next to the `TimetabledTime`, and are absent when no realtime
//!   data exists for a service

mod client;
mod error;
mod parse;
mod request;
mod types;

pub use client::{DEFAULT_ENDPOINT, TriasClient, TriasConfig};
pub use error::TriasError;
pub use types::{
    Departure, LocationCandidate, PlaceRef, StopCandidate, TimedLeg, TripConnection, TripLeg,
    WalkLeg,
};
