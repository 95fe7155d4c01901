//! Docker Engine API client
//!
//! Thin [`ControlPlane`] adapter over `bollard`. Hosts follow `DOCKER_HOST`
//! conventions: `unix:///var/run/docker.sock` (the default), a bare socket
//! path, `tcp://host:2375` or `http://host:2375` such as a
//! docker-socket-proxy sidecar.

use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::{Docker, API_DEFAULT_VERSION};
use tracing::{debug, instrument};

use crate::control_plane::{ContainerDetails, ContainerSummary, ControlPlane};
use crate::error::{ControlPlaneError, Result};

/// Host used when `DOCKER_HOST` is not set
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport a host string resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    /// Path of a local socket
    Unix(String),
    /// `http://host:port`
    Http(String),
}

/// Docker Engine API client
#[derive(Debug, Clone)]
pub struct DockerClient {
    docker: Docker,
    host: String,
}

impl DockerClient {
    /// Create a client for `host`
    pub fn new(host: &str) -> Result<Self> {
        Self::with_timeout(host, DEFAULT_TIMEOUT)
    }

    /// Create a client from `DOCKER_HOST`, falling back to [`DEFAULT_DOCKER_HOST`]
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("DOCKER_HOST").unwrap_or_else(|_| DEFAULT_DOCKER_HOST.into());
        Self::new(&host)
    }

    /// Create a client with a custom request timeout
    pub fn with_timeout(host: &str, timeout: Duration) -> Result<Self> {
        let secs = timeout.as_secs().max(1);
        let docker = match parse_host(host)? {
            #[cfg(unix)]
            Endpoint::Unix(path) => Docker::connect_with_unix(&path, secs, API_DEFAULT_VERSION)?,
            #[cfg(not(unix))]
            Endpoint::Unix(_) => return Err(ControlPlaneError::UnsupportedHost(host.to_string())),
            Endpoint::Http(addr) => Docker::connect_with_http(&addr, secs, API_DEFAULT_VERSION)?,
        };

        Ok(Self {
            docker,
            host: host.trim().to_string(),
        })
    }

    /// The host this client was created for
    pub fn host(&self) -> &str {
        &self.host
    }
}

/// Map a Docker host string onto a transport
///
/// The Engine API is always addressed from the root, so hosts carrying a
/// path prefix are refused instead of having the prefix dropped.
fn parse_host(host: &str) -> Result<Endpoint> {
    let host = host.trim();
    if let Some(path) = host.strip_prefix("unix://") {
        return Ok(Endpoint::Unix(path.to_string()));
    }
    if host.starts_with('/') {
        return Ok(Endpoint::Unix(host.to_string()));
    }

    let authority = if let Some(rest) = host.strip_prefix("tcp://") {
        rest
    } else if let Some(rest) = host.strip_prefix("http://") {
        rest
    } else if host.contains("://") {
        return Err(ControlPlaneError::UnsupportedHost(host.to_string()));
    } else {
        host
    };

    let authority = authority.trim_end_matches('/');
    if authority.is_empty() {
        return Err(ControlPlaneError::UnsupportedHost(host.to_string()));
    }
    if authority.contains('/') {
        return Err(ControlPlaneError::UnsupportedHost(format!(
            "{} (path prefixes are not supported)",
            host
        )));
    }
    Ok(Endpoint::Http(format!("http://{}", authority)))
}

#[async_trait]
impl ControlPlane for DockerClient {
    #[instrument(skip(self), fields(host = %self.host))]
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        let options = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(options)).await?;
        debug!(count = containers.len(), "Listed running containers");
        Ok(containers.into_iter().map(ContainerSummary::from).collect())
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails> {
        match self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(ControlPlaneError::from)
        {
            Ok(inspected) => Ok(inspected.into()),
            Err(ControlPlaneError::ServerError { status: 404, .. }) => {
                Err(ControlPlaneError::ContainerNotFound(id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn ping(&self) -> Result<()> {
        self.docker.ping().await?;
        Ok(())
    }
}
