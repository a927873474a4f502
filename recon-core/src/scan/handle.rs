use recon_model::{RunId, ScanOutcome, TargetId, TaskStatus};
use tokio::task::JoinHandle;

use crate::error::{ReconError, Result};

/// Summary of one finished run, as seen by the run itself.
///
/// Unlike the registry status, this is produced even when the run was
/// superseded and its final status was discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub target_id: TargetId,
    pub run_id: RunId,
    pub outcome: ScanOutcome,
    pub hosts_total: u64,
    pub hosts_processed: u64,
    pub hosts_persisted: u64,
    pub last_error: Option<String>,
}

#[derive(Debug)]
enum HandleState {
    Finished(ScanReport),
    Running(JoinHandle<ScanReport>),
}

/// Handle to a started scan. Dropping it detaches the run; [`wait`] awaits
/// its completion.
///
/// [`wait`]: ScanHandle::wait
#[derive(Debug)]
pub struct ScanHandle {
    target_id: TargetId,
    run_id: RunId,
    initial_status: TaskStatus,
    state: HandleState,
}

impl ScanHandle {
    pub(crate) fn finished(initial_status: TaskStatus, report: ScanReport) -> Self {
        Self {
            target_id: report.target_id,
            run_id: report.run_id,
            initial_status,
            state: HandleState::Finished(report),
        }
    }

    pub(crate) fn spawned(
        target_id: TargetId,
        run_id: RunId,
        initial_status: TaskStatus,
        task: JoinHandle<ScanReport>,
    ) -> Self {
        Self {
            target_id,
            run_id,
            initial_status,
            state: HandleState::Running(task),
        }
    }

    pub fn target_id(&self) -> TargetId {
        self.target_id
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Status installed when the run was started.
    pub fn initial_status(&self) -> &TaskStatus {
        &self.initial_status
    }

    pub fn is_finished(&self) -> bool {
        match &self.state {
            HandleState::Finished(_) => true,
            HandleState::Running(task) => task.is_finished(),
        }
    }

    /// Waits for the run to end and returns its report.
    pub async fn wait(self) -> Result<ScanReport> {
        match self.state {
            HandleState::Finished(report) => Ok(report),
            HandleState::Running(task) => task.await.map_err(|err| {
                ReconError::Internal(format!(
                    "scan task for target {} failed: {err}",
                    self.target_id
                ))
            }),
        }
    }
}
