use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use recon_core::{
    ProbeBatch, ProbeError, ProbeOptions, ProbeRunner, ProbeSettings, ReconError, ScanOrchestrator,
    ScanToken, StaticProxyConfig, TargetStore,
};
use recon_model::{Hostname, HostnameId, PersistedProbeResult, TargetId};
use recon_server::{AppState, create_router};
use serde_json::Value;
use tower::ServiceExt;

/// Runner that either answers immediately with no observations or waits
/// for cancellation.
#[derive(Debug)]
pub struct StubRunner {
    pub block: bool,
}

#[async_trait]
impl ProbeRunner for StubRunner {
    fn ensure_available(&self) -> Result<(), ProbeError> {
        Ok(())
    }

    async fn probe_batch(
        &self,
        _hostnames: &[String],
        _options: &ProbeOptions,
        token: &ScanToken,
    ) -> Result<ProbeBatch, ProbeError> {
        if self.block {
            token.cancelled().await;
            return Err(ProbeError::Cancelled);
        }
        Ok(ProbeBatch::default())
    }
}

#[derive(Debug, Default)]
pub struct StubStore {
    targets: HashMap<TargetId, Vec<Hostname>>,
}

impl StubStore {
    pub fn with_target(mut self, target_id: TargetId, names: &[&str]) -> Self {
        let hosts = names
            .iter()
            .map(|name| Hostname::new(HostnameId::new(), *name))
            .collect();
        self.targets.insert(target_id, hosts);
        self
    }
}

#[async_trait]
impl TargetStore for StubStore {
    async fn resolve_hostnames(&self, target_id: TargetId) -> recon_core::Result<Vec<Hostname>> {
        self.targets
            .get(&target_id)
            .cloned()
            .ok_or_else(|| ReconError::NotFound(format!("target {target_id}")))
    }

    async fn persist_probe_result(
        &self,
        _hostname_id: HostnameId,
        _result: &PersistedProbeResult,
    ) -> recon_core::Result<()> {
        Ok(())
    }
}

#[allow(unused)]
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub fn build_test_app(store: StubStore, block: bool) -> TestApp {
    let scans = ScanOrchestrator::new(
        ProbeSettings::default(),
        Arc::new(StubRunner { block }),
        Arc::new(store),
        Arc::new(StaticProxyConfig::none()),
    );
    let state = AppState::new(scans);
    TestApp {
        router: create_router(state.clone()),
        state,
    }
}

/// Sends one request through the router and decodes the JSON body.
pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(request.body(body).expect("request"))
        .await
        .expect("router response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
