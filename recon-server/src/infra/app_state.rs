use std::fmt;

use recon_core::ScanOrchestrator;

/// Shared handler state. Clones share one orchestrator.
#[derive(Clone)]
pub struct AppState {
    scans: ScanOrchestrator,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("active_scans", &self.scans.active_scans().len())
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(scans: ScanOrchestrator) -> Self {
        Self { scans }
    }

    pub fn scans(&self) -> &ScanOrchestrator {
        &self.scans
    }
}
