use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, anyhow, bail};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::probe::ProbeOptions;

const DEFAULT_SETTINGS_FILE: &str = "probe.toml";

/// Source that produced the probe settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProbeSettingsSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

/// Tuning for probe scans. Every field has a default so deployments can
/// override only what they need.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Probe executable. A value containing a path separator is used as-is;
    /// a bare name is looked up on `PATH`.
    pub binary: String,
    /// Hostnames submitted per probe invocation. Smaller batches give finer
    /// grained progress and cancellation at the cost of more process spawns.
    pub batch_size: usize,
    /// Per-host request timeout handed to the probe (seconds).
    pub per_host_timeout_secs: u64,
    /// Probe-internal concurrency.
    pub threads: usize,
    /// Probe-internal retry count per host.
    pub retries: u32,
    pub random_agent: bool,
    /// Wall-clock ceiling for one whole scan run (seconds).
    pub run_deadline_secs: u64,
    /// Static upstream proxy used when no other provider supplies one.
    pub proxy_url: Option<Url>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            binary: "httpx".to_string(),
            batch_size: 50,
            per_host_timeout_secs: 10,
            threads: 25,
            retries: 1,
            random_agent: true,
            run_deadline_secs: 60 * 60,
            proxy_url: None,
        }
    }
}

impl ProbeSettings {
    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.run_deadline_secs)
    }

    pub fn per_host_timeout(&self) -> Duration {
        Duration::from_secs(self.per_host_timeout_secs)
    }

    /// Invocation flags for one run, with the proxy resolved by the caller.
    pub fn probe_options(&self, proxy: Option<Url>) -> ProbeOptions {
        ProbeOptions {
            per_host_timeout: self.per_host_timeout(),
            threads: self.threads,
            retries: self.retries,
            random_agent: self.random_agent,
            proxy,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.binary.trim().is_empty() {
            bail!("probe binary must not be empty");
        }
        if self.batch_size == 0 {
            bail!("batch_size must be greater than zero");
        }
        if self.threads == 0 {
            bail!("threads must be greater than zero");
        }
        if self.per_host_timeout_secs == 0 {
            bail!("per_host_timeout_secs must be greater than zero");
        }
        if self.run_deadline_secs == 0 {
            bail!("run_deadline_secs must be greater than zero");
        }
        if let Some(proxy) = &self.proxy_url {
            validate_proxy_url(proxy)?;
        }
        Ok(())
    }

    /// Load probe settings using environment variables.
    /// Evaluation order:
    /// 1) `$PROBE_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$PROBE_CONFIG_JSON` (inline JSON),
    /// 3) `probe.toml` in the working directory,
    /// 4) defaults.
    pub fn load_from_env() -> anyhow::Result<(Self, ProbeSettingsSource)> {
        if let Ok(path_str) = env::var("PROBE_CONFIG_PATH")
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str);
            let settings = Self::load_from_file(&path)?;
            return Ok((settings, ProbeSettingsSource::EnvPath(path)));
        }

        if let Ok(raw) = env::var("PROBE_CONFIG_JSON")
            && !raw.trim().is_empty()
        {
            let parsed = Self::parse_json(&raw).context("failed to parse PROBE_CONFIG_JSON")?;
            return Ok((parsed, ProbeSettingsSource::EnvInline));
        }

        let default_path = PathBuf::from(DEFAULT_SETTINGS_FILE);
        if default_path.is_file() {
            let settings = Self::load_from_file(&default_path)?;
            return Ok((settings, ProbeSettingsSource::File(default_path)));
        }

        Ok((Self::default(), ProbeSettingsSource::Default))
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read probe settings from {}", path.display()))?;

        let parsed = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::parse_json(&contents),
            _ => Self::parse_toml(&contents),
        };
        parsed.with_context(|| format!("invalid probe settings {}", path.display()))
    }

    pub fn parse_json(raw: &str) -> anyhow::Result<Self> {
        let settings: Self = serde_json::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn parse_toml(raw: &str) -> anyhow::Result<Self> {
        let settings: Self = toml::from_str(raw).map_err(|err| anyhow!("{err}"))?;
        settings.validate()?;
        Ok(settings)
    }
}

pub(crate) fn validate_proxy_url(proxy: &Url) -> anyhow::Result<()> {
    match proxy.scheme() {
        "http" | "https" | "socks5" => {}
        other => bail!("unsupported proxy scheme `{other}`"),
    }
    if proxy.host_str().is_none() {
        bail!("proxy url `{proxy}` has no host");
    }
    Ok(())
}
