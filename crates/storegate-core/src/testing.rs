//! In-memory doubles for discovery and storage
//!
//! Used by the orchestrator and transport tests to run the full
//! discovery → routing → storage path without Docker or MinIO.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;

use crate::backend::{BackendDiscovery, ObjectStore, ObjectStream, PartialListing, StoreConnector};
use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::node::{BackendNode, DiscoverySnapshot, SkippedBackend};

/// Descriptor for a fake backend with the given index
pub fn test_node(node_index: u32) -> BackendNode {
    BackendNode {
        node_index,
        address: format!("10.0.0.{}", node_index + 10),
        port: 9000,
        access_key: format!("access{}", node_index),
        secret_key: format!("secret{}", node_index),
        container_id: format!("container{}", node_index),
        hostname: Some(format!("node{}", node_index)),
    }
}

/// Discovery that returns a fixed, swappable backend set
#[derive(Default)]
pub struct StaticDiscovery {
    nodes: Mutex<Vec<BackendNode>>,
    skipped: Mutex<Vec<SkippedBackend>>,
    unavailable: AtomicBool,
    calls: AtomicUsize,
}

impl StaticDiscovery {
    pub fn new(nodes: Vec<BackendNode>) -> Self {
        Self {
            nodes: Mutex::new(nodes),
            ..Default::default()
        }
    }

    pub fn set_nodes(&self, nodes: Vec<BackendNode>) {
        *self.nodes.lock() = nodes;
    }

    pub fn set_skipped(&self, skipped: Vec<SkippedBackend>) {
        *self.skipped.lock() = skipped;
    }

    /// Make list and ping calls fail as if the control plane were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `list_backends` calls served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> GatewayResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GatewayError::discovery(
                "list containers",
                "control plane unreachable",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl BackendDiscovery for StaticDiscovery {
    async fn list_backends(&self, ctx: &RequestContext) -> GatewayResult<DiscoverySnapshot> {
        ctx.check()?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(DiscoverySnapshot {
            nodes: self.nodes.lock().clone(),
            skipped: self.skipped.lock().clone(),
        })
    }

    async fn ping(&self, ctx: &RequestContext) -> GatewayResult<()> {
        ctx.check()?;
        self.check_available()
    }
}

/// One fake backend holding objects in memory
pub struct MemoryStore {
    node: BackendNode,
    objects: Mutex<BTreeMap<String, Bytes>>,
    operations: Mutex<Vec<String>>,
    fail_listing: AtomicBool,
    list_delay: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn new(node: BackendNode) -> Self {
        Self {
            node,
            objects: Mutex::new(BTreeMap::new()),
            operations: Mutex::new(Vec::new()),
            fail_listing: AtomicBool::new(false),
            list_delay: Mutex::new(None),
        }
    }

    /// Operations served so far, e.g. `put:abc`, `get:abc`, `list`
    pub fn operations(&self) -> Vec<String> {
        self.operations.lock().clone()
    }

    pub fn object(&self, object_id: &str) -> Option<Bytes> {
        self.objects.lock().get(object_id).cloned()
    }

    pub fn insert(&self, object_id: &str, body: impl Into<Bytes>) {
        self.objects.lock().insert(object_id.to_string(), body.into());
    }

    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn set_list_delay(&self, delay: Option<Duration>) {
        *self.list_delay.lock() = delay;
    }

    fn record(&self, operation: String) {
        self.operations.lock().push(operation);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn node(&self) -> &BackendNode {
        &self.node
    }

    async fn put(&self, ctx: &RequestContext, object_id: &str, body: Bytes) -> GatewayResult<()> {
        ctx.check()?;
        self.record(format!("put:{}", object_id));
        self.objects.lock().insert(object_id.to_string(), body);
        Ok(())
    }

    async fn get(&self, ctx: &RequestContext, object_id: &str) -> GatewayResult<ObjectStream> {
        ctx.check()?;
        self.record(format!("get:{}", object_id));
        let body = self
            .object(object_id)
            .ok_or_else(|| GatewayError::not_found(object_id, self.node.node_index))?;
        Ok(futures::stream::once(async move { Ok::<_, std::io::Error>(body) }).boxed())
    }

    async fn list_all(&self, ctx: &RequestContext) -> Result<Vec<String>, PartialListing> {
        self.record("list".to_string());
        let delay = *self.list_delay.lock();
        if let Some(delay) = delay {
            ctx.run(async {
                tokio::time::sleep(delay).await;
                Ok(())
            })
            .await?;
        }
        ctx.check()?;

        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(GatewayError::backend(
                self.node.node_index,
                "list objects",
                "injected listing failure",
            )
            .into());
        }
        Ok(self.objects.lock().keys().cloned().collect())
    }
}

/// Connector that hands out one [`MemoryStore`] per node index
#[derive(Default)]
pub struct MemoryConnector {
    stores: Mutex<HashMap<u32, Arc<MemoryStore>>>,
    refused: Mutex<HashSet<u32>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store for `node_index`, created on first use
    pub fn store(&self, node: &BackendNode) -> Arc<MemoryStore> {
        self.stores
            .lock()
            .entry(node.node_index)
            .or_insert_with(|| Arc::new(MemoryStore::new(node.clone())))
            .clone()
    }

    /// Store for `node_index` if one was ever created
    pub fn existing(&self, node_index: u32) -> Option<Arc<MemoryStore>> {
        self.stores.lock().get(&node_index).cloned()
    }

    /// Make `connect` fail for this node
    pub fn refuse(&self, node_index: u32) {
        self.refused.lock().insert(node_index);
    }
}

impl StoreConnector for MemoryConnector {
    fn connect(&self, node: &BackendNode) -> GatewayResult<Arc<dyn ObjectStore>> {
        if self.refused.lock().contains(&node.node_index) {
            return Err(GatewayError::backend(
                node.node_index,
                "create client",
                "connection refused",
            ));
        }
        let store: Arc<dyn ObjectStore> = self.store(node);
        Ok(store)
    }
}
