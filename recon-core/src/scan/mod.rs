//! Scan orchestration: starting a background run per target, driving it
//! batch by batch through the probe, and reporting how it ended.

mod handle;
mod orchestrator;

pub use handle::{ScanHandle, ScanReport};
pub use orchestrator::ScanOrchestrator;
