//! Data model shared by the probe-scan core and its HTTP server.
#![allow(missing_docs)]

pub mod api;
pub mod hostname;
pub mod ids;
pub mod probe;
pub mod status;

pub use api::{
    ActiveScansResponse, ApiResponse, StartProbeRequest, StartProbeResponse, StopProbeResponse,
};
pub use hostname::{Hostname, normalize_hostname};
pub use ids::{HostnameId, RunId, TargetId};
pub use probe::{NO_RESPONSE_JSON, PersistedProbeResult, ProbeObservation, TECHNOLOGY_SEPARATOR};
pub use status::{CancelReason, ScanOutcome, ScanPhase, TaskStatus};
