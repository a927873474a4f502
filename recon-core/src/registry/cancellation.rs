use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, OnceLock},
    time::Duration,
};

use parking_lot::Mutex;
use recon_model::{CancelReason, RunId, TargetId};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cooperative cancellation signal observed by one scan run.
///
/// Combines an explicit token with the run's wall-clock deadline. Whichever
/// fires first fixes the [`CancelReason`]; later triggers are ignored.
#[derive(Clone)]
pub struct ScanToken {
    token: CancellationToken,
    reason: Arc<OnceLock<CancelReason>>,
    deadline: Instant,
}

impl fmt::Debug for ScanToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanToken")
            .field("cancelled", &self.token.is_cancelled())
            .field("reason", &self.reason.get())
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl ScanToken {
    pub fn new(deadline: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            reason: Arc::new(OnceLock::new()),
            deadline: Instant::now() + deadline,
        }
    }

    /// Whether the run should stop. Trips the token if the deadline passed.
    pub fn is_cancelled(&self) -> bool {
        if self.token.is_cancelled() {
            return true;
        }
        if Instant::now() >= self.deadline {
            self.trigger(CancelReason::DeadlineExceeded);
            return true;
        }
        false
    }

    /// Resolves once the token is cancelled or the deadline elapses.
    pub async fn cancelled(&self) {
        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = tokio::time::sleep_until(self.deadline) => {
                self.trigger(CancelReason::DeadlineExceeded);
            }
        }
    }

    /// Reason recorded by the first trigger, if any.
    pub fn reason(&self) -> Option<CancelReason> {
        self.reason.get().copied()
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Cancels with `reason`. Returns `false` when the token had already
    /// been cancelled, in which case the original reason is kept.
    fn trigger(&self, reason: CancelReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        self.token.cancel();
        first
    }
}

/// The cancel side of a registered [`ScanToken`], tagged with the run that
/// owns it.
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    run_id: RunId,
    token: ScanToken,
}

impl CancellationHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn cancel(&self, reason: CancelReason) -> bool {
        self.token.trigger(reason)
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// One live cancellation handle per target.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    handles: Mutex<HashMap<TargetId, CancellationHandle>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh token for `run_id` and installs its handle, replacing
    /// whatever was registered for the target. A replaced handle belongs to a
    /// stale run and is cancelled as superseded.
    pub fn register(
        &self,
        target_id: TargetId,
        run_id: RunId,
        deadline: Duration,
    ) -> (ScanToken, CancellationHandle) {
        let token = ScanToken::new(deadline);
        let handle = CancellationHandle {
            run_id,
            token: token.clone(),
        };

        let stale = self.handles.lock().insert(target_id, handle.clone());

        if let Some(stale) = stale {
            debug!(
                target = %target_id,
                stale_run = %stale.run_id,
                run = %run_id,
                "replacing cancellation handle of superseded run"
            );
            stale.cancel(CancelReason::Superseded);
        }

        (token, handle)
    }

    /// Removes and fires the target's handle as superseded, for a new run
    /// that registers no handle of its own.
    pub fn supersede(&self, target_id: TargetId) -> bool {
        let handle = self.handles.lock().remove(&target_id);
        match handle {
            Some(handle) => {
                debug!(
                    target = %target_id,
                    stale_run = %handle.run_id,
                    "dropping cancellation handle of superseded run"
                );
                handle.cancel(CancelReason::Superseded);
                true
            }
            None => false,
        }
    }

    /// Removes and fires the target's handle. Returns whether a live scan was
    /// found; cancelling an unknown or finished target is a no-op.
    pub fn cancel(&self, target_id: TargetId) -> bool {
        let handle = self.handles.lock().remove(&target_id);
        match handle {
            Some(handle) => {
                handle.cancel(CancelReason::UserRequested);
                true
            }
            None => false,
        }
    }

    /// Drops the handle installed by `run_id`, leaving any newer run's handle
    /// in place. Safe to call after a concurrent [`cancel`](Self::cancel)
    /// already removed it.
    pub fn unregister(&self, target_id: TargetId, run_id: RunId) -> bool {
        let mut handles = self.handles.lock();
        match handles.get(&target_id) {
            Some(handle) if handle.run_id == run_id => {
                handles.remove(&target_id);
                true
            }
            _ => false,
        }
    }

    pub fn is_registered(&self, target_id: TargetId) -> bool {
        self.handles.lock().contains_key(&target_id)
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }
}
