use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;
use recon_model::{RunId, ScanOutcome, TargetId, TaskStatus};

/// Latest [`TaskStatus`] per target.
///
/// Writes are scoped to the run that installed the entry: once a newer run
/// starts for the same target, the older run's updates are ignored. Every
/// read hands back a copy.
#[derive(Debug, Default)]
pub struct TaskStatusRegistry {
    statuses: Mutex<HashMap<TargetId, TaskStatus>>,
}

impl TaskStatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a fresh running status, replacing any previous entry whether
    /// or not that run finished.
    pub fn start(&self, target_id: TargetId, run_id: RunId, hosts_total: u64) -> TaskStatus {
        let status = TaskStatus::running(target_id, run_id, hosts_total);
        self.statuses.lock().insert(target_id, status.clone());
        status
    }

    /// Installs an already-finished status for a run with no hostnames.
    pub fn nothing_to_scan(&self, target_id: TargetId, run_id: RunId) -> TaskStatus {
        let mut status = TaskStatus::running(target_id, run_id, 0);
        apply_outcome(&mut status, &ScanOutcome::NothingToScan);
        self.statuses.lock().insert(target_id, status.clone());
        status
    }

    /// Applies `mutate` to the running status owned by `run_id`. Returns the
    /// updated copy, or `None` if the entry belongs to another run or has
    /// already finished.
    pub fn update<F>(&self, target_id: TargetId, run_id: RunId, mutate: F) -> Option<TaskStatus>
    where
        F: FnOnce(&mut TaskStatus),
    {
        let mut statuses = self.statuses.lock();
        let status = statuses.get_mut(&target_id)?;
        if status.run_id != Some(run_id) || !status.is_running {
            return None;
        }
        mutate(status);
        Some(status.clone())
    }

    /// Stores `error` as the run's `last_error` unless one is already held.
    pub fn record_error(&self, target_id: TargetId, run_id: RunId, error: &str) -> bool {
        let mut stored = false;
        self.update(target_id, run_id, |status| {
            stored = status.record_error(error);
        });
        stored
    }

    /// Marks the run finished and composes its final message. A failure
    /// outcome only fills `last_error` when nothing was recorded earlier.
    pub fn finish(
        &self,
        target_id: TargetId,
        run_id: RunId,
        outcome: &ScanOutcome,
    ) -> Option<TaskStatus> {
        self.update(target_id, run_id, |status| apply_outcome(status, outcome))
    }

    pub fn read(&self, target_id: TargetId) -> Option<TaskStatus> {
        self.statuses.lock().get(&target_id).cloned()
    }

    /// Like [`read`](Self::read), with the "never scanned" sentinel instead of
    /// `None`.
    pub fn read_or_unknown(&self, target_id: TargetId) -> TaskStatus {
        self.read(target_id)
            .unwrap_or_else(|| TaskStatus::unknown(target_id))
    }

    /// Targets whose latest run is still going.
    pub fn running_targets(&self) -> Vec<TargetId> {
        let mut targets: Vec<TargetId> = self
            .statuses
            .lock()
            .values()
            .filter(|status| status.is_running)
            .map(|status| status.target_id)
            .collect();
        targets.sort();
        targets
    }
}

fn apply_outcome(status: &mut TaskStatus, outcome: &ScanOutcome) {
    if let ScanOutcome::Failed(error) = outcome {
        status.record_error(error.as_str());
    }
    status.phase = outcome.phase();
    status.is_running = false;
    status.finished_at = Some(Utc::now());
    status.message = final_message(outcome, status);
}

/// Human-readable summary of a finished run.
pub fn final_message(outcome: &ScanOutcome, status: &TaskStatus) -> String {
    let counts = format!(
        "{}/{} hosts processed, {} persisted",
        status.hosts_processed, status.hosts_total, status.hosts_persisted
    );

    match outcome {
        ScanOutcome::NothingToScan => "nothing to scan: target has no hostnames".to_string(),
        ScanOutcome::Completed if status.has_error() => format!("completed with errors: {counts}"),
        ScanOutcome::Completed => format!("completed: {counts}"),
        ScanOutcome::Cancelled(reason) => format!("{} after {counts}", reason.as_str()),
        ScanOutcome::Failed(error) => format!("failed: {error} ({counts})"),
    }
}

/// Progress message written after each batch.
pub fn batch_message(batch: usize, batches: usize) -> String {
    format!("batch {batch} of {batches} finished")
}
