use axum::{
    Router,
    routing::{get, post},
};

use crate::{
    AppState,
    handlers::probe::{
        active_probes_handler, probe_status_handler, start_probe_handler, stop_probe_handler,
    },
};

/// Create all v1 API routes
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route(
            "/targets/{target_id}/probe",
            post(start_probe_handler)
                .get(probe_status_handler)
                .delete(stop_probe_handler),
        )
        .route("/probe/active", get(active_probes_handler))
}
