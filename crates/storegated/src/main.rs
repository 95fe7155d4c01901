//! storegated - storegate router daemon
//!
//! Serves the object API on top of the MinIO containers found through the
//! Docker Engine API.
//!
//! Usage:
//!   storegated [OPTIONS]
//!
//! Configuration comes from an optional TOML file (`--config`), with every
//! CLI flag or its environment variable taking precedence.

mod cli;
mod config;
mod logging;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use storegate_api::{create_router, AppState};
use storegate_core::{BackendDiscovery, CachingDiscovery, RequestContext};
use storegate_discovery::{ContainerDiscovery, DockerClient};
use storegate_gateway::Gateway;
use storegate_s3::S3Connector;

use crate::cli::Cli;
use crate::config::Config;

/// Budget for the informational control-plane check at startup
const STARTUP_PING_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::resolve(&cli)?;

    logging::init(&config.logging);
    tracing::info!("Starting storegated");

    let gateway = build_gateway(&config)?;

    // Not fatal: the control plane may come up after us, /ready reports it
    if !gateway
        .is_ready(&RequestContext::with_timeout(STARTUP_PING_TIMEOUT))
        .await
    {
        tracing::warn!("Control plane not reachable yet");
    }

    let state = AppState::new(gateway)
        .with_request_timeout(config.server.request_timeout())
        .with_max_upload_bytes(config.server.max_upload_bytes);
    let app = create_router(state);

    let addr = config.server.listen;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down cleanly");
    Ok(())
}

/// Wire discovery, the optional cache and the S3 connector into a gateway
fn build_gateway(config: &Config) -> anyhow::Result<Gateway> {
    let docker = match &config.docker.host {
        Some(host) => DockerClient::new(host),
        None => DockerClient::from_env(),
    }
    .context("Invalid Docker host")?;
    tracing::info!(
        docker = %docker.host(),
        name_prefix = %config.discovery.backends.name_prefix,
        "Using Docker control plane"
    );

    let mut discovery: Arc<dyn BackendDiscovery> = Arc::new(ContainerDiscovery::new(
        Arc::new(docker),
        config.discovery.backends.clone(),
    ));
    if let Some(ttl) = config.discovery.cache_ttl() {
        tracing::info!(ttl_ms = ttl.as_millis() as u64, "Discovery cache enabled");
        discovery = Arc::new(CachingDiscovery::new(discovery, ttl));
    }

    let connector =
        S3Connector::new(config.s3.clone()).context("Failed to build S3 HTTP client")?;
    tracing::info!(bucket = %config.s3.bucket, region = %config.s3.region, "Using S3 backends");

    Ok(Gateway::new(discovery, Arc::new(connector)))
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received, draining connections");
}
