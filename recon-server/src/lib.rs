//! HTTP surface for background probe scans: start, poll and stop a scan per
//! target, plus a list of scans in flight.

pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;
pub use routes::create_router;
