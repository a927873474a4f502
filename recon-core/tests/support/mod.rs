//! In-memory collaborators for orchestration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use recon_core::{
    ObservationSet, ProbeBatch, ProbeError, ProbeOptions, ProbeRunner, ProbeSettings, ReconError,
    ScanOrchestrator, ScanToken, StaticProxyConfig, TargetStore, error::Result,
};
use recon_model::{Hostname, HostnameId, PersistedProbeResult, TargetId};
use serde_json::json;
use tokio::sync::{Notify, mpsc};

/// One JSON line as the probe would print it.
pub fn probe_line(input: &str, url: &str, status: u16, title: &str, tech: &[&str]) -> String {
    json!({
        "input": input,
        "url": url,
        "status_code": status,
        "content_length": 1024,
        "title": title,
        "webserver": "nginx",
        "tech": tech,
    })
    .to_string()
}

pub fn hostnames(names: &[&str]) -> Vec<Hostname> {
    names
        .iter()
        .map(|name| Hostname::new(HostnameId::new(), *name))
        .collect()
}

pub fn settings(batch_size: usize) -> ProbeSettings {
    ProbeSettings {
        batch_size,
        ..ProbeSettings::default()
    }
}

pub fn orchestrator(
    settings: ProbeSettings,
    runner: Arc<ScriptedRunner>,
    store: Arc<InMemoryStore>,
) -> ScanOrchestrator {
    ScanOrchestrator::new(settings, runner, store, Arc::new(StaticProxyConfig::none()))
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    targets: Mutex<HashMap<TargetId, Vec<Hostname>>>,
    results: Mutex<HashMap<HostnameId, PersistedProbeResult>>,
    failing: Mutex<HashSet<HostnameId>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_target(&self, target_id: TargetId, hostnames: Vec<Hostname>) {
        self.targets.lock().insert(target_id, hostnames);
    }

    /// Makes every write for `hostname_id` fail.
    pub fn fail_writes_for(&self, hostname_id: HostnameId) {
        self.failing.lock().insert(hostname_id);
    }

    pub fn result(&self, hostname_id: HostnameId) -> Option<PersistedProbeResult> {
        self.results.lock().get(&hostname_id).cloned()
    }

    pub fn result_count(&self) -> usize {
        self.results.lock().len()
    }
}

#[async_trait]
impl TargetStore for InMemoryStore {
    async fn resolve_hostnames(&self, target_id: TargetId) -> Result<Vec<Hostname>> {
        self.targets
            .lock()
            .get(&target_id)
            .cloned()
            .ok_or_else(|| ReconError::NotFound(format!("target {target_id}")))
    }

    async fn persist_probe_result(
        &self,
        hostname_id: HostnameId,
        result: &PersistedProbeResult,
    ) -> Result<()> {
        if self.failing.lock().contains(&hostname_id) {
            return Err(ReconError::Internal("write rejected".into()));
        }
        self.results.lock().insert(hostname_id, result.clone());
        Ok(())
    }
}

/// Probe runner that answers from a fixed script instead of a process.
///
/// Calls are numbered from 1 across every scan that uses the runner.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    lines: HashMap<String, Vec<String>>,
    failing_calls: HashSet<usize>,
    block_from: Option<usize>,
    pause_on: Option<usize>,
    missing: bool,
    blocked: Option<mpsc::UnboundedSender<Vec<String>>>,
    release: Notify,
    calls: Mutex<Vec<Vec<String>>>,
    options: Mutex<Vec<ProbeOptions>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, host: &str, line: String) -> Self {
        self.lines.entry(host.to_string()).or_default().push(line);
        self
    }

    pub fn fail_call(mut self, call: usize) -> Self {
        self.failing_calls.insert(call);
        self
    }

    pub fn missing_binary(mut self) -> Self {
        self.missing = true;
        self
    }

    /// From call `call` on, every invocation waits for cancellation. The
    /// receiver yields each blocked batch once it is waiting.
    pub fn block_from_call(mut self, call: usize) -> (Self, mpsc::UnboundedReceiver<Vec<String>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.block_from = Some(call);
        self.blocked = Some(tx);
        (self, rx)
    }

    /// Call `call` waits for [`ScriptedRunner::release`] without watching
    /// the token, then answers normally. The receiver yields the paused
    /// batch once it is waiting.
    pub fn pause_on_call(mut self, call: usize) -> (Self, mpsc::UnboundedReceiver<Vec<String>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.pause_on = Some(call);
        self.blocked = Some(tx);
        (self, rx)
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }

    pub fn options_seen(&self) -> Vec<ProbeOptions> {
        self.options.lock().clone()
    }
}

#[async_trait]
impl ProbeRunner for ScriptedRunner {
    fn ensure_available(&self) -> std::result::Result<(), ProbeError> {
        if self.missing {
            return Err(ProbeError::BinaryNotFound {
                binary: "httpx".into(),
            });
        }
        Ok(())
    }

    async fn probe_batch(
        &self,
        hostnames: &[String],
        options: &ProbeOptions,
        token: &ScanToken,
    ) -> std::result::Result<ProbeBatch, ProbeError> {
        let call = {
            let mut calls = self.calls.lock();
            calls.push(hostnames.to_vec());
            calls.len()
        };
        self.options.lock().push(options.clone());

        if self.block_from.is_some_and(|from| call >= from) {
            if let Some(blocked) = &self.blocked {
                let _ = blocked.send(hostnames.to_vec());
            }
            token.cancelled().await;
            return Err(ProbeError::Cancelled);
        }

        if self.pause_on == Some(call) {
            if let Some(blocked) = &self.blocked {
                let _ = blocked.send(hostnames.to_vec());
            }
            self.release.notified().await;
        }

        if self.failing_calls.contains(&call) {
            return Err(ProbeError::Exited {
                code: Some(1),
                stderr: "scripted failure".into(),
            });
        }

        let mut observations = ObservationSet::default();
        for host in hostnames {
            for line in self.lines.get(host).into_iter().flatten() {
                observations.push_line(line);
            }
        }

        Ok(ProbeBatch {
            observations,
            stderr: String::new(),
        })
    }
}
