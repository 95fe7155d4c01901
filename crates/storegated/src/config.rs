//! TOML configuration for storegated
//!
//! Every section and field is optional; a missing file or an empty one
//! yields the defaults below. CLI flags are applied on top with
//! [`Config::apply_cli`].

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use storegate_discovery::DiscoveryConfig;
use storegate_s3::S3Options;

use crate::cli::Cli;

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_upload_bytes() -> usize {
    storegate_api::state::DEFAULT_MAX_UPLOAD_BYTES
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            request_timeout_secs: default_request_timeout_secs(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Control-plane connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Engine endpoint, `DOCKER_HOST` or the local default when unset
    #[serde(default)]
    pub host: Option<String>,
}

/// Backend recognition plus the optional snapshot cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoverySection {
    #[serde(flatten)]
    pub backends: DiscoveryConfig,
    /// Snapshot cache TTL in milliseconds, 0 disables the cache
    #[serde(default)]
    pub cache_ttl_ms: u64,
}

impl DiscoverySection {
    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache_ttl_ms > 0).then(|| Duration::from_millis(self.cache_ttl_ms))
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// `EnvFilter` directives, overridden by `RUST_LOG`
    #[serde(default)]
    pub filter: Option<String>,
}

/// Top-level storegated configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub discovery: DiscoverySection,
    #[serde(default)]
    pub s3: S3Options,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))
    }

    /// File named by the CLI (or defaults), then CLI overrides
    pub fn resolve(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_cli(cli);
        Ok(config)
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(listen) = cli.listen {
            self.server.listen = listen;
        }
        if let Some(secs) = cli.request_timeout_secs {
            self.server.request_timeout_secs = secs;
        }
        if let Some(host) = &cli.docker_host {
            self.docker.host = Some(host.clone());
        }
        if let Some(prefix) = &cli.name_prefix {
            self.discovery.backends.name_prefix = prefix.clone();
        }
        if let Some(port) = cli.s3_port {
            self.discovery.backends.s3_port = port;
        }
        if let Some(ttl) = cli.discovery_cache_ms {
            self.discovery.cache_ttl_ms = ttl;
        }
        if let Some(bucket) = &cli.bucket {
            self.s3.bucket = bucket.clone();
        }
        if let Some(format) = cli.log_format {
            self.logging.format = format;
        }
    }
}
