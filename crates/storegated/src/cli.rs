//! Command-line arguments
//!
//! Every flag overrides the matching config file entry and can also be set
//! through its environment variable.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::config::LogFormat;

#[derive(Parser, Debug, Default)]
#[command(name = "storegated")]
#[command(author, version, about = "Object-storage router over discovered MinIO backends")]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "STOREGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to serve HTTP on
    #[arg(short, long, env = "STOREGATE_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Docker Engine endpoint (unix://, tcp:// or http://)
    #[arg(long, env = "DOCKER_HOST")]
    pub docker_host: Option<String>,

    /// Per-request deadline in seconds
    #[arg(long, env = "STOREGATE_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Container name fragment identifying storage backends
    #[arg(long, env = "STOREGATE_NAME_PREFIX")]
    pub name_prefix: Option<String>,

    /// S3 port of every backend
    #[arg(long, env = "STOREGATE_S3_PORT")]
    pub s3_port: Option<u16>,

    /// Bucket holding the objects on every backend
    #[arg(long, env = "STOREGATE_BUCKET")]
    pub bucket: Option<String>,

    /// Discovery cache TTL in milliseconds, 0 disables the cache
    #[arg(long, env = "STOREGATE_DISCOVERY_CACHE_MS")]
    pub discovery_cache_ms: Option<u64>,

    /// Log output format
    #[arg(long, value_enum, env = "STOREGATE_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
}
