use async_trait::async_trait;
use recon_model::{Hostname, HostnameId, PersistedProbeResult, TargetId};
use sqlx::{PgPool, Row, postgres::PgPoolOptions};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use super::{ProxyConfigProvider, TargetStore};
use crate::{
    error::{ReconError, Result},
    settings::validate_proxy_url,
};

/// [`TargetStore`] over the `targets` and `hostnames` tables.
#[derive(Debug, Clone)]
pub struct PostgresTargetStore {
    pool: PgPool,
}

impl PostgresTargetStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the bundled migrations.
    pub async fn migrate(&self) -> Result<()> {
        crate::MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|err| ReconError::Internal(format!("migration failed: {err}")))
    }
}

#[async_trait]
impl TargetStore for PostgresTargetStore {
    async fn resolve_hostnames(&self, target_id: TargetId) -> Result<Vec<Hostname>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM targets WHERE id = $1)")
            .bind(target_id.to_uuid())
            .fetch_one(&self.pool)
            .await?;

        if !exists {
            return Err(ReconError::NotFound(format!("target {target_id}")));
        }

        let rows = sqlx::query("SELECT id, name FROM hostnames WHERE target_id = $1 ORDER BY name")
            .bind(target_id.to_uuid())
            .fetch_all(&self.pool)
            .await?;

        let hostnames = rows
            .into_iter()
            .map(|row| {
                let id: Uuid = row.try_get("id")?;
                let name: String = row.try_get("name")?;
                Ok(Hostname::new(HostnameId(id), name))
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;

        debug!(target = %target_id, hosts = hostnames.len(), "resolved hostnames");
        Ok(hostnames)
    }

    async fn persist_probe_result(
        &self,
        hostname_id: HostnameId,
        result: &PersistedProbeResult,
    ) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE hostnames
               SET probe_status_code = $2,
                   probe_content_length = $3,
                   probe_title = $4,
                   probe_server = $5,
                   probe_technologies = $6,
                   probe_raw = $7,
                   probe_scanned_at = NOW()
             WHERE id = $1
            "#,
        )
        .bind(hostname_id.to_uuid())
        .bind(result.status_code)
        .bind(result.content_length)
        .bind(&result.title)
        .bind(&result.server)
        .bind(&result.technologies)
        .bind(&result.raw_json)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(ReconError::NotFound(format!("hostname {hostname_id}")));
        }
        Ok(())
    }
}

/// [`ProxyConfigProvider`] reading the most recent `proxy_settings` row.
#[derive(Debug, Clone)]
pub struct PostgresProxyConfig {
    pool: PgPool,
}

impl PostgresProxyConfig {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProxyConfigProvider for PostgresProxyConfig {
    async fn upstream_proxy(&self) -> Result<Option<Url>> {
        let row = sqlx::query(
            "SELECT enabled, url FROM proxy_settings ORDER BY updated_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let enabled: bool = row.try_get("enabled")?;
        let raw: Option<String> = row.try_get("url")?;
        Ok(proxy_from_row(enabled, raw.as_deref()))
    }
}

/// The row's proxy, held to the same rules as a configured `proxy_url`.
/// Disabled, blank, unparsable or unsupported values yield `None`.
fn proxy_from_row(enabled: bool, raw: Option<&str>) -> Option<Url> {
    let raw = raw.map(str::trim).filter(|raw| enabled && !raw.is_empty())?;

    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(err) => {
            warn!(error = %err, "ignoring unparsable proxy url");
            return None;
        }
    };

    match validate_proxy_url(&url) {
        Ok(()) => Some(url),
        Err(err) => {
            warn!(error = %err, "ignoring unsupported proxy url");
            None
        }
    }
}
