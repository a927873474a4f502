use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use recon_model::{
    ActiveScansResponse, ApiResponse, StartProbeRequest, StartProbeResponse, StopProbeResponse,
    TargetId,
};
use tracing::info;
use uuid::Uuid;

use crate::infra::{app_state::AppState, errors::AppResult};

/// Starts a probe scan. With no body the target's hostnames come from the
/// store; otherwise the listed hostnames are scanned as given.
pub async fn start_probe_handler(
    State(state): State<AppState>,
    Path(target_id): Path<Uuid>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let target_id = TargetId::from(target_id);
    let request = parse_start_request(&body)?;

    let handle = match request.hostnames {
        Some(hostnames) => {
            info!(
                target = %target_id,
                hosts = hostnames.len(),
                "probe scan requested with explicit hostnames"
            );
            state.scans().start_scan(target_id, hostnames)
        }
        None => state.scans().start_target_scan(target_id).await?,
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(StartProbeResponse {
            status: handle.initial_status().clone(),
        })),
    ))
}

pub async fn probe_status_handler(
    State(state): State<AppState>,
    Path(target_id): Path<Uuid>,
) -> impl IntoResponse {
    Json(ApiResponse::success(state.scans().status(TargetId::from(target_id))))
}

/// Always 200; `found` says whether a live scan was cancelled.
pub async fn stop_probe_handler(
    State(state): State<AppState>,
    Path(target_id): Path<Uuid>,
) -> impl IntoResponse {
    let found = state.scans().stop_scan(TargetId::from(target_id));
    let response = ApiResponse::success(StopProbeResponse { found });
    if found {
        Json(response)
    } else {
        Json(response.with_message("no probe scan is running for this target".to_string()))
    }
}

pub async fn active_probes_handler(State(state): State<AppState>) -> impl IntoResponse {
    let targets = state.scans().active_scans();
    Json(ApiResponse::success(ActiveScansResponse {
        count: targets.len(),
        targets,
    }))
}

fn parse_start_request(body: &[u8]) -> AppResult<StartProbeRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(StartProbeRequest::default());
    }
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_resolves_from_store() {
        assert!(parse_start_request(b"").expect("empty").hostnames.is_none());
        assert!(parse_start_request(b" \n").expect("blank").hostnames.is_none());
        assert!(parse_start_request(b"{}").expect("object").hostnames.is_none());
    }

    #[test]
    fn malformed_body_is_a_bad_request() {
        let err = parse_start_request(b"{\"hostnames\": 3}").expect_err("bad body");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
