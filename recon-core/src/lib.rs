//! # Recon Core
//!
//! Background probe scans for the recon backend. A scan takes every hostname
//! recorded for a target, feeds them in batches to an external HTTP probe,
//! reduces each hostname's observations to the single most useful one and
//! writes it back to the store.
//!
//! ## Overview
//!
//! - **Probe invocation**: [`probe::ProcessProbeRunner`] runs the probe binary
//!   once per batch, streams its JSON-lines output and kills it on cancel.
//! - **Reconciliation**: [`probe::pick_best`] chooses one observation per
//!   hostname.
//! - **Status and cancellation**: [`registry`] keeps one pollable status and
//!   one cancellation handle per target.
//! - **Orchestration**: [`scan::ScanOrchestrator`] ties it together and is
//!   what callers hold.
//!
//! ## Feature Flags
//!
//! - `database` (default): PostgreSQL-backed [`store::PostgresTargetStore`]
//!   and [`store::PostgresProxyConfig`], plus [`MIGRATOR`].
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use recon_core::{
//!     ProbeSettings, ProcessProbeRunner, ScanOrchestrator, StaticProxyConfig, TargetStore,
//! };
//! use recon_model::TargetId;
//!
//! async fn scan(store: Arc<dyn TargetStore>, target: TargetId) -> recon_core::Result<()> {
//!     let settings = ProbeSettings::default();
//!     let orchestrator = ScanOrchestrator::new(
//!         settings.clone(),
//!         Arc::new(ProcessProbeRunner::from_settings(&settings)),
//!         store,
//!         Arc::new(StaticProxyConfig::none()),
//!     );
//!
//!     let report = orchestrator.start_target_scan(target).await?.wait().await?;
//!     println!("{} of {} hosts persisted", report.hosts_persisted, report.hosts_total);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod probe;
pub mod registry;
pub mod scan;
pub mod settings;
pub mod store;

pub use error::{ProbeError, ReconError, Result};
pub use probe::{
    ObservationSet, ProbeBatch, ProbeOptions, ProbeRunner, ProcessProbeRunner, pick_best,
};
pub use registry::{CancellationRegistry, ScanToken, TaskStatusRegistry};
pub use scan::{ScanHandle, ScanOrchestrator, ScanReport};
pub use settings::{ProbeSettings, ProbeSettingsSource};
pub use store::{ProxyConfigProvider, StaticProxyConfig, TargetStore};

#[cfg(feature = "database")]
pub use store::{PostgresProxyConfig, PostgresTargetStore};

/// Embedded schema migrations for the PostgreSQL store.
#[cfg(feature = "database")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
