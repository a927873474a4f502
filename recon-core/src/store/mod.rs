//! Contracts with the outside world: where hostnames come from, where probe
//! results go, and where the upstream proxy is configured.

#[cfg(feature = "database")]
#[cfg_attr(docsrs, doc(cfg(feature = "database")))]
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use recon_model::{Hostname, HostnameId, PersistedProbeResult, TargetId};
use url::Url;

use crate::error::Result;

#[cfg(feature = "database")]
pub use postgres::{PostgresProxyConfig, PostgresTargetStore};

/// Owner of targets and their hostnames. Expected to serialize its own
/// writes; the orchestrator issues one write per hostname per run.
#[async_trait]
pub trait TargetStore: Send + Sync + fmt::Debug {
    /// Hostnames belonging to `target_id`. Unknown targets are
    /// [`ReconError::NotFound`](crate::error::ReconError::NotFound).
    async fn resolve_hostnames(&self, target_id: TargetId) -> Result<Vec<Hostname>>;

    /// Overwrites the stored probe result for one hostname.
    async fn persist_probe_result(
        &self,
        hostname_id: HostnameId,
        result: &PersistedProbeResult,
    ) -> Result<()>;
}

/// Supplies the upstream proxy for probe invocations, if any.
#[async_trait]
pub trait ProxyConfigProvider: Send + Sync + fmt::Debug {
    async fn upstream_proxy(&self) -> Result<Option<Url>>;
}

/// Proxy provider backed by a fixed value, typically from settings.
#[derive(Debug, Clone, Default)]
pub struct StaticProxyConfig {
    proxy: Option<Url>,
}

impl StaticProxyConfig {
    pub fn new(proxy: Option<Url>) -> Self {
        Self { proxy }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProxyConfigProvider for StaticProxyConfig {
    async fn upstream_proxy(&self) -> Result<Option<Url>> {
        Ok(self.proxy.clone())
    }
}
