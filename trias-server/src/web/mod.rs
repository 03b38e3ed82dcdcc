//! Web layer for the TRIAS API server.
//!
//! Provides HTTP endpoints for stop search, departure boards, trip
//! planning and stop-cache control.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::create_router;
pub use state::AppState;
