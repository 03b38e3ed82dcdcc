//! Domain types for the transit API server.
//!
//! This module contains the validated core types shared by the gateway,
//! the stop cache, and the web layer. All types enforce their invariants
//! at construction time, so code that receives them can trust their
//! validity.

mod point;
mod stop;

pub use point::{GeoPoint, InvalidCoordinate};
pub use stop::{InvalidStopId, Stop, StopId};
