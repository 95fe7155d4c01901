//! Builds an [`S3Client`] per discovered backend

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use storegate_core::{BackendNode, GatewayError, GatewayResult, ObjectStore, StoreConnector};

use crate::client::S3Client;
use crate::error::Result;

/// Settings shared by every backend client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Options {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Whole-request timeout, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_bucket() -> String {
    "spacelift-storage".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    5
}

impl Default for S3Options {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            region: default_region(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// [`StoreConnector`] handing out [`S3Client`]s over one connection pool
#[derive(Debug, Clone)]
pub struct S3Connector {
    http: Client,
    options: S3Options,
}

impl S3Connector {
    pub fn new(options: S3Options) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(options.request_timeout_secs))
            .connect_timeout(Duration::from_secs(options.connect_timeout_secs))
            .build()?;
        Ok(Self::with_client(http, options))
    }

    /// Use an existing HTTP client
    pub fn with_client(http: Client, options: S3Options) -> Self {
        Self { http, options }
    }

    pub fn options(&self) -> &S3Options {
        &self.options
    }

    /// Concrete client for `node`
    pub fn client(&self, node: &BackendNode) -> Result<S3Client> {
        S3Client::new(
            self.http.clone(),
            node.clone(),
            self.options.bucket.clone(),
            self.options.region.clone(),
        )
    }
}

impl StoreConnector for S3Connector {
    fn connect(&self, node: &BackendNode) -> GatewayResult<Arc<dyn ObjectStore>> {
        let client = self
            .client(node)
            .map_err(|e| GatewayError::backend(node.node_index, "create client", e))?;
        let store: Arc<dyn ObjectStore> = Arc::new(client);
        Ok(store)
    }
}
