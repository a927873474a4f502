use chrono::{DateTime, Utc};

use crate::ids::{RunId, TargetId};

/// Lifecycle of a single probe scan run.
///
/// `Idle` only appears on the sentinel status of a target that has never been
/// scanned. The three terminal phases are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ScanPhase {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl ScanPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanPhase::Idle => "idle",
            ScanPhase::Running => "running",
            ScanPhase::Completed => "completed",
            ScanPhase::Cancelled => "cancelled",
            ScanPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ScanPhase::Completed | ScanPhase::Cancelled | ScanPhase::Failed
        )
    }
}

/// Why a run's cancellation token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CancelReason {
    /// A caller asked to stop the scan.
    UserRequested,
    /// The run's wall-clock deadline elapsed.
    DeadlineExceeded,
    /// A newer run for the same target replaced this one.
    Superseded,
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelReason::UserRequested => "cancelled by user",
            CancelReason::DeadlineExceeded => "timed out",
            CancelReason::Superseded => "superseded by a newer scan",
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Every batch was attempted.
    Completed,
    /// The target had no hostnames; nothing was spawned.
    NothingToScan,
    Cancelled(CancelReason),
    /// Setup-level or unrecoverable failure.
    Failed(String),
}

impl ScanOutcome {
    pub fn phase(&self) -> ScanPhase {
        match self {
            ScanOutcome::Completed | ScanOutcome::NothingToScan => ScanPhase::Completed,
            ScanOutcome::Cancelled(_) => ScanPhase::Cancelled,
            ScanOutcome::Failed(_) => ScanPhase::Failed,
        }
    }
}

/// Pollable progress record for the most recent scan of one target.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskStatus {
    pub target_id: TargetId,
    pub run_id: Option<RunId>,
    pub phase: ScanPhase,
    pub is_running: bool,
    pub message: String,
    pub hosts_total: u64,
    /// Probe attempts made, whatever their result.
    pub hosts_processed: u64,
    /// Store writes attempted that succeeded.
    pub hosts_persisted: u64,
    /// First error recorded during the run; empty when none.
    pub last_error: String,
    pub start_time: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskStatus {
    /// Sentinel returned for targets that have never been scanned.
    pub fn unknown(target_id: TargetId) -> Self {
        Self {
            target_id,
            run_id: None,
            phase: ScanPhase::Idle,
            is_running: false,
            message: "no probe scan has been run for this target".to_string(),
            hosts_total: 0,
            hosts_processed: 0,
            hosts_persisted: 0,
            last_error: String::new(),
            start_time: None,
            finished_at: None,
        }
    }

    /// Fresh status for a run that is about to start probing.
    pub fn running(target_id: TargetId, run_id: RunId, hosts_total: u64) -> Self {
        Self {
            target_id,
            run_id: Some(run_id),
            phase: ScanPhase::Running,
            is_running: true,
            message: format!("starting probe scan of {hosts_total} hosts"),
            hosts_total,
            hosts_processed: 0,
            hosts_persisted: 0,
            last_error: String::new(),
            start_time: Some(Utc::now()),
            finished_at: None,
        }
    }

    /// Records `error` only if no earlier error is held. Returns whether the
    /// value was stored.
    pub fn record_error(&mut self, error: impl Into<String>) -> bool {
        if !self.last_error.is_empty() {
            return false;
        }
        let error = error.into();
        if error.is_empty() {
            return false;
        }
        self.last_error = error;
        true
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn has_error(&self) -> bool {
        !self.last_error.is_empty()
    }
}
