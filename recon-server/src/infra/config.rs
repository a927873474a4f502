use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, bail};
use clap::Args;
use recon_core::{ProbeSettings, ProbeSettingsSource};
use tracing::info;

/// Listener and database settings, from flags or the environment.
#[derive(Args, Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "RECON_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind
    #[arg(short, long, env = "RECON_PORT", default_value_t = 8088)]
    pub port: u16,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Apply pending migrations before serving
    #[arg(long, env = "RECON_MIGRATE_ON_START", default_value_t = false)]
    pub migrate_on_start: bool,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("invalid RECON_HOST `{}`", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        match self.database_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url),
            _ => bail!("DATABASE_URL must be set"),
        }
    }
}

/// Loads and validates probe settings, logging where they came from.
pub fn load_probe_settings() -> anyhow::Result<ProbeSettings> {
    let (settings, source) =
        ProbeSettings::load_from_env().context("failed to load probe settings")?;
    settings.validate().context("invalid probe settings")?;

    match &source {
        ProbeSettingsSource::Default => info!("probe settings: defaults"),
        ProbeSettingsSource::EnvInline => info!("probe settings: PROBE_CONFIG_JSON"),
        ProbeSettingsSource::EnvPath(path) | ProbeSettingsSource::File(path) => {
            info!(path = %path.display(), "probe settings loaded from file")
        }
    }
    info!(
        binary = %settings.binary,
        batch_size = settings.batch_size,
        threads = settings.threads,
        deadline_secs = settings.run_deadline_secs,
        "probe settings ready"
    );

    Ok(settings)
}
