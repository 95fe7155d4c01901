//! Traits at the seams between the orchestrator and its collaborators
//!
//! - [`BackendDiscovery`] enumerates live backends from the control plane.
//! - [`ObjectStore`] performs put/get/list against one backend.
//! - [`StoreConnector`] builds an [`ObjectStore`] for a descriptor.
//!
//! There is one wire implementation of [`ObjectStore`]; the trait exists so
//! the orchestrator can be exercised against in-memory doubles.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::node::{BackendNode, DiscoverySnapshot};

/// Object body returned by [`ObjectStore::get`]
pub type ObjectStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Source of the current backend set
#[async_trait]
pub trait BackendDiscovery: Send + Sync {
    /// Enumerate the currently running backends.
    ///
    /// An empty snapshot is a valid answer. Malformed backends are reported
    /// in [`DiscoverySnapshot::skipped`] rather than failing the call.
    async fn list_backends(&self, ctx: &RequestContext) -> GatewayResult<DiscoverySnapshot>;

    /// Lightweight liveness check of the control plane connection
    async fn ping(&self, ctx: &RequestContext) -> GatewayResult<()>;
}

/// Storage operations against a single backend
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Descriptor of the backend this store talks to
    fn node(&self) -> &BackendNode;

    /// Store `body` under `object_id`, replacing any existing object
    async fn put(&self, ctx: &RequestContext, object_id: &str, body: Bytes) -> GatewayResult<()>;

    /// Fetch the object, or [`GatewayError::ObjectNotFound`]
    async fn get(&self, ctx: &RequestContext, object_id: &str) -> GatewayResult<ObjectStream>;

    /// Every object id stored on this backend
    async fn list_all(&self, ctx: &RequestContext) -> Result<Vec<String>, PartialListing>;
}

/// Builds the storage client for a discovered backend
pub trait StoreConnector: Send + Sync {
    fn connect(&self, node: &BackendNode) -> GatewayResult<Arc<dyn ObjectStore>>;
}

/// A listing that stopped early, with whatever was collected before the error
#[derive(Debug, Error)]
#[error("listing interrupted: {error}")]
pub struct PartialListing {
    pub collected: Vec<String>,
    #[source]
    pub error: GatewayError,
}

impl PartialListing {
    pub fn new(collected: Vec<String>, error: GatewayError) -> Self {
        Self { collected, error }
    }

    pub fn into_error(self) -> GatewayError {
        self.error
    }
}

impl From<GatewayError> for PartialListing {
    fn from(error: GatewayError) -> Self {
        Self::new(Vec::new(), error)
    }
}
