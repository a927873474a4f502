//! # Recon Server
//!
//! Runs background probe scans for recon targets and exposes them over HTTP.
//!
//! ## Architecture
//!
//! The server is built on Axum and uses:
//! - PostgreSQL for targets, hostnames, probe results and proxy settings
//! - an external HTTP probe binary (httpx by default) for fingerprinting

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use recon_core::{
    PostgresProxyConfig, PostgresTargetStore, ProbeRunner, ProcessProbeRunner, ScanOrchestrator,
};
use recon_server::{
    AppState, create_router,
    infra::config::{ServerConfig, load_probe_settings},
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "recon-server")]
#[command(about = "Background probe scans for recon targets")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServerConfig,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before clap, so `.env` values feed the env fallbacks.
    let env_file = dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(path) = env_file {
        info!(path = %path.display(), "loaded environment file");
    }

    let cli = Cli::parse();

    if let Some(Command::Db(DbCommand::Migrate)) = cli.command {
        return run_db_migrate(&cli.serve).await;
    }

    run_server(cli.serve).await
}

async fn connect_store(config: &ServerConfig) -> anyhow::Result<PostgresTargetStore> {
    let database_url = config.require_database_url()?;
    PostgresTargetStore::connect(database_url)
        .await
        .context("failed to connect to PostgreSQL")
}

async fn run_db_migrate(config: &ServerConfig) -> anyhow::Result<()> {
    let store = connect_store(config).await?;
    store.migrate().await.context("database migration failed")?;
    info!("Database migrations applied");
    Ok(())
}

async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let settings = load_probe_settings()?;
    let addr = config.socket_addr()?;

    let store = connect_store(&config).await?;
    if config.migrate_on_start {
        store.migrate().await.context("database migration failed")?;
        info!("Database migrations applied");
    }

    let runner = ProcessProbeRunner::from_settings(&settings);
    if let Err(err) = runner.ensure_available() {
        // Scans fail individually until the binary shows up.
        warn!(error = %err, "probe binary not available at startup");
    }

    let proxy = PostgresProxyConfig::new(store.pool().clone());
    let scans = ScanOrchestrator::new(settings, Arc::new(runner), Arc::new(store), Arc::new(proxy));
    let router = create_router(AppState::new(scans));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "recon server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("recon server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
