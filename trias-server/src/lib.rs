//! TRIAS public-transit API server.
//!
//! A web application in front of a TRIAS endpoint: stop search,
//! departure boards and trip planning, backed by an in-memory stop
//! cache that answers nearby queries without hitting the upstream.

pub mod cache;
pub mod config;
pub mod domain;
pub mod stops;
pub mod trias;
pub mod web;
