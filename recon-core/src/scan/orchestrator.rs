use std::sync::Arc;

use parking_lot::Mutex;
use recon_model::{
    CancelReason, Hostname, PersistedProbeResult, RunId, ScanOutcome, TargetId, TaskStatus,
};
use tracing::{debug, error, info, instrument, warn};

use super::handle::{ScanHandle, ScanReport};
use crate::{
    error::Result,
    probe::{ProbeBatch, ProbeOptions, ProbeRunner, pick_best},
    registry::{CancellationRegistry, ScanToken, TaskStatusRegistry, status::batch_message},
    settings::ProbeSettings,
    store::{ProxyConfigProvider, TargetStore},
};

/// Starts, tracks and stops background probe scans, one run per target.
///
/// Cheap to clone; every clone shares the same registries.
#[derive(Debug, Clone)]
pub struct ScanOrchestrator {
    inner: Arc<OrchestratorInner>,
}

#[derive(Debug)]
struct OrchestratorInner {
    settings: ProbeSettings,
    runner: Arc<dyn ProbeRunner>,
    store: Arc<dyn TargetStore>,
    proxy: Arc<dyn ProxyConfigProvider>,
    statuses: TaskStatusRegistry,
    cancellations: CancellationRegistry,
    /// Held while a run's handle and status are installed together.
    start_lock: Mutex<()>,
}

impl ScanOrchestrator {
    pub fn new(
        settings: ProbeSettings,
        runner: Arc<dyn ProbeRunner>,
        store: Arc<dyn TargetStore>,
        proxy: Arc<dyn ProxyConfigProvider>,
    ) -> Self {
        Self {
            inner: Arc::new(OrchestratorInner {
                settings,
                runner,
                store,
                proxy,
                statuses: TaskStatusRegistry::new(),
                cancellations: CancellationRegistry::new(),
                start_lock: Mutex::new(()),
            }),
        }
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.inner.settings
    }

    /// Starts a scan of `hostnames` for `target_id` and returns immediately.
    ///
    /// Any earlier run for the target is superseded: its status is replaced
    /// and its cancellation handle fired. An empty host list finishes on the
    /// spot without spawning anything. Must be called inside a Tokio runtime.
    pub fn start_scan(&self, target_id: TargetId, hostnames: Vec<Hostname>) -> ScanHandle {
        let inner = &self.inner;
        let run_id = RunId::new();

        if hostnames.is_empty() {
            let status = {
                let _installing = inner.start_lock.lock();
                inner.cancellations.supersede(target_id);
                inner.statuses.nothing_to_scan(target_id, run_id)
            };
            info!(target = %target_id, run = %run_id, "nothing to scan");
            let report = ScanReport {
                target_id,
                run_id,
                outcome: ScanOutcome::NothingToScan,
                hosts_total: 0,
                hosts_processed: 0,
                hosts_persisted: 0,
                last_error: None,
            };
            return ScanHandle::finished(status, report);
        }

        // Overlapping starts for one target must agree on which run owns both
        // the registered handle and the status.
        let deadline = inner.settings.run_deadline();
        let hosts_total = hostnames.len() as u64;
        let (token, status) = {
            let _installing = inner.start_lock.lock();
            let (token, _) = inner.cancellations.register(target_id, run_id, deadline);
            let status = inner.statuses.start(target_id, run_id, hosts_total);
            (token, status)
        };

        info!(
            target = %target_id,
            run = %run_id,
            hosts = hostnames.len(),
            batch_size = inner.settings.batch_size,
            "probe scan started"
        );

        let task = tokio::spawn(Arc::clone(inner).run(target_id, run_id, hostnames, token));

        ScanHandle::spawned(target_id, run_id, status, task)
    }

    /// Resolves the target's hostnames from the store, then starts a scan.
    pub async fn start_target_scan(&self, target_id: TargetId) -> Result<ScanHandle> {
        let hostnames = self.inner.store.resolve_hostnames(target_id).await?;
        Ok(self.start_scan(target_id, hostnames))
    }

    /// Current status for the target, or the "never scanned" sentinel.
    pub fn status(&self, target_id: TargetId) -> TaskStatus {
        self.inner.statuses.read_or_unknown(target_id)
    }

    /// Requests cancellation of the target's live run. Returns `false` when
    /// there is none; existing statuses are left untouched in that case.
    pub fn stop_scan(&self, target_id: TargetId) -> bool {
        let found = self.inner.cancellations.cancel(target_id);
        if found {
            info!(target = %target_id, "probe scan cancellation requested");
        } else {
            debug!(target = %target_id, "no active probe scan to cancel");
        }
        found
    }

    /// Targets with a run in progress.
    pub fn active_scans(&self) -> Vec<TargetId> {
        self.inner.statuses.running_targets()
    }
}

/// Counters the run keeps for its own report, mirrored into the registry.
struct RunProgress {
    target_id: TargetId,
    run_id: RunId,
    hosts_total: u64,
    hosts_processed: u64,
    hosts_persisted: u64,
    last_error: Option<String>,
}

impl RunProgress {
    fn new(target_id: TargetId, run_id: RunId, hosts_total: usize) -> Self {
        Self {
            target_id,
            run_id,
            hosts_total: hosts_total as u64,
            hosts_processed: 0,
            hosts_persisted: 0,
            last_error: None,
        }
    }

    fn into_report(self, outcome: ScanOutcome) -> ScanReport {
        ScanReport {
            target_id: self.target_id,
            run_id: self.run_id,
            outcome,
            hosts_total: self.hosts_total,
            hosts_processed: self.hosts_processed,
            hosts_persisted: self.hosts_persisted,
            last_error: self.last_error,
        }
    }
}

impl OrchestratorInner {
    #[instrument(
        name = "probe_scan",
        skip(self, hostnames, token),
        fields(target = %target_id, run = %run_id)
    )]
    async fn run(
        self: Arc<Self>,
        target_id: TargetId,
        run_id: RunId,
        hostnames: Vec<Hostname>,
        token: ScanToken,
    ) -> ScanReport {
        let mut progress = RunProgress::new(target_id, run_id, hostnames.len());

        let outcome = self.execute(&mut progress, &hostnames, &token).await;

        if let ScanOutcome::Failed(reason) = &outcome {
            self.record_error(&mut progress, reason);
        }

        self.cancellations.unregister(target_id, run_id);

        match self.statuses.finish(target_id, run_id, &outcome) {
            Some(status) => info!(
                processed = status.hosts_processed,
                persisted = status.hosts_persisted,
                total = status.hosts_total,
                message = %status.message,
                "probe scan finished"
            ),
            None => debug!("probe scan superseded; final status discarded"),
        }

        progress.into_report(outcome)
    }

    async fn execute(
        &self,
        progress: &mut RunProgress,
        hostnames: &[Hostname],
        token: &ScanToken,
    ) -> ScanOutcome {
        if let Err(err) = self.runner.ensure_available() {
            error!(error = %err, "probe binary unavailable; aborting scan");
            return ScanOutcome::Failed(err.to_string());
        }

        let options = self.probe_options().await;
        let batches: Vec<&[Hostname]> = hostnames.chunks(self.settings.batch_size.max(1)).collect();
        let batch_count = batches.len();

        for (index, batch) in batches.into_iter().enumerate() {
            let number = index + 1;

            if token.is_cancelled() {
                let reason = cancel_reason(token);
                info!(
                    batch = number,
                    batches = batch_count,
                    reason = reason.as_str(),
                    "probe scan stopping before batch"
                );
                return ScanOutcome::Cancelled(reason);
            }

            let names: Vec<String> = batch.iter().map(|host| host.name.clone()).collect();
            debug!(
                batch = number,
                batches = batch_count,
                hosts = names.len(),
                "probing batch"
            );

            let persisted = match self.runner.probe_batch(&names, &options, token).await {
                Ok(output) => {
                    if !output.stderr.is_empty() {
                        debug!(batch = number, stderr = %output.stderr, "probe stderr");
                    }
                    self.persist_batch(progress, batch, &output).await
                }
                Err(err) if err.is_cancelled() => {
                    let reason = cancel_reason(token);
                    info!(
                        batch = number,
                        reason = reason.as_str(),
                        "probe batch interrupted"
                    );
                    return ScanOutcome::Cancelled(reason);
                }
                Err(err) if err.is_binary_missing() => {
                    error!(batch = number, error = %err, "probe binary disappeared");
                    return ScanOutcome::Failed(err.to_string());
                }
                Err(err) => {
                    error!(
                        batch = number,
                        hosts = names.len(),
                        error = %err,
                        "probe batch failed; skipping its hosts"
                    );
                    self.record_error(progress, &format!("batch {number} of {batch_count}: {err}"));
                    0
                }
            };

            let attempted = batch.len() as u64;
            progress.hosts_processed += attempted;
            progress.hosts_persisted += persisted;
            self.statuses.update(progress.target_id, progress.run_id, |status| {
                status.hosts_processed += attempted;
                status.hosts_persisted += persisted;
                status.message = batch_message(number, batch_count);
            });
        }

        ScanOutcome::Completed
    }

    /// Writes one result per hostname in the batch and returns how many
    /// writes succeeded.
    async fn persist_batch(
        &self,
        progress: &mut RunProgress,
        batch: &[Hostname],
        output: &ProbeBatch,
    ) -> u64 {
        let mut persisted = 0;

        for host in batch {
            let observations = output.observations.for_hostname(&host.name);
            let result = match pick_best(observations) {
                Some(best) => PersistedProbeResult::from(best),
                None => PersistedProbeResult::no_response(),
            };

            match self.store.persist_probe_result(host.id, &result).await {
                Ok(()) => persisted += 1,
                Err(err) => {
                    warn!(
                        host = %host.name,
                        hostname_id = %host.id,
                        error = %err,
                        "failed to persist probe result"
                    );
                    self.record_error(progress, &format!("persisting {}: {err}", host.name));
                }
            }
        }

        persisted
    }

    /// Provider proxy first, then the one from settings.
    async fn probe_options(&self) -> ProbeOptions {
        let provided = match self.proxy.upstream_proxy().await {
            Ok(proxy) => proxy,
            Err(err) => {
                warn!(error = %err, "proxy lookup failed; using configured fallback");
                None
            }
        };
        let proxy = provided.or_else(|| self.settings.proxy_url.clone());
        if let Some(proxy) = &proxy {
            debug!(proxy = %proxy, "probing through upstream proxy");
        }
        self.settings.probe_options(proxy)
    }

    /// First error wins, both locally and in the registry.
    fn record_error(&self, progress: &mut RunProgress, error: &str) {
        if progress.last_error.is_none() {
            progress.last_error = Some(error.to_string());
        }
        self.statuses.record_error(progress.target_id, progress.run_id, error);
    }
}

fn cancel_reason(token: &ScanToken) -> CancelReason {
    token.reason().unwrap_or(CancelReason::UserRequested)
}
