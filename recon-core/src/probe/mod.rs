//! Everything that touches the external probe binary: invocation, output
//! decoding, and picking one observation per hostname.

pub mod decode;
pub mod invoker;
pub mod reconcile;

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::{error::ProbeError, registry::ScanToken};

pub use decode::ObservationSet;
pub use invoker::ProcessProbeRunner;
pub use reconcile::{is_better, pick_best};

/// Flags for one probe invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOptions {
    pub per_host_timeout: Duration,
    pub threads: usize,
    pub retries: u32,
    pub random_agent: bool,
    pub proxy: Option<Url>,
}

/// Output of one successful invocation.
#[derive(Debug, Default)]
pub struct ProbeBatch {
    pub observations: ObservationSet,
    /// Leading non-blank lines of standard error, for diagnostics only.
    pub stderr: String,
}

/// Seam between the orchestrator and whatever actually runs the probe.
#[async_trait]
pub trait ProbeRunner: Send + Sync + std::fmt::Debug {
    /// Confirms the probe can be run at all. Called once per scan before any
    /// batch is attempted.
    fn ensure_available(&self) -> Result<(), ProbeError>;

    /// Probes `hostnames` in one invocation. Must return
    /// [`ProbeError::Cancelled`] promptly once `token` fires.
    async fn probe_batch(
        &self,
        hostnames: &[String],
        options: &ProbeOptions,
        token: &ScanToken,
    ) -> Result<ProbeBatch, ProbeError>;
}
