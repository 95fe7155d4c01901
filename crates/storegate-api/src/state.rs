//! Application state for the storegate API

use std::sync::Arc;
use std::time::Duration;

use storegate_core::RequestContext;
use storegate_gateway::Gateway;

/// Default per-request deadline
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default upper bound on an uploaded object
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    gateway: Arc<Gateway>,
    request_timeout: Duration,
    max_upload_bytes: usize,
}

impl AppState {
    /// Create a new AppState around the gateway
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_upload_bytes(mut self, max: usize) -> Self {
        self.max_upload_bytes = max;
        self
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Fresh context for one request, expiring after the request timeout
    pub fn request_context(&self) -> RequestContext {
        RequestContext::with_timeout(self.request_timeout)
    }
}
