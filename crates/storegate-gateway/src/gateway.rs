//! Gateway - Routes object operations to the backend owning the object

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use storegate_core::{
    select_backend, BackendDiscovery, GatewayResult, ObjectStore, ObjectStream, RequestContext,
    StoreConnector,
};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

/// Stateless orchestrator over a discovery source and a store connector
#[derive(Clone)]
pub struct Gateway {
    discovery: Arc<dyn BackendDiscovery>,
    connector: Arc<dyn StoreConnector>,
}

impl Gateway {
    pub fn new(discovery: Arc<dyn BackendDiscovery>, connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            discovery,
            connector,
        }
    }

    /// Discover, select and connect to the backend owning `object_id`
    async fn route(
        &self,
        ctx: &RequestContext,
        operation: &str,
        object_id: &str,
    ) -> GatewayResult<Arc<dyn ObjectStore>> {
        let snapshot = self
            .discovery
            .list_backends(ctx)
            .await
            .map_err(|e| e.context(format_args!("{} {}", operation, object_id)))?;
        let node = select_backend(object_id, &snapshot.nodes)?;
        debug!(
            node_index = node.node_index,
            container_id = %node.container_id,
            backends = snapshot.len(),
            "Selected backend"
        );
        self.connector
            .connect(node)
            .map_err(|e| e.context(format_args!("{} {}", operation, object_id)))
    }

    /// Store `body` under `object_id` on the owning backend
    #[instrument(skip(self, ctx, body), fields(size = body.len()))]
    pub async fn put(
        &self,
        ctx: &RequestContext,
        object_id: &str,
        body: Bytes,
    ) -> GatewayResult<()> {
        let store = self.route(ctx, "put object", object_id).await?;
        store.put(ctx, object_id, body).await.inspect_err(|e| {
            warn!(node_index = store.node().node_index, error = %e, "Put failed");
        })?;
        info!(node_index = store.node().node_index, "Object stored");
        Ok(())
    }

    /// Fetch `object_id` from the owning backend
    ///
    /// The returned body stays bound to `ctx`: it fails once the context is
    /// cancelled or its deadline passes.
    #[instrument(skip(self, ctx))]
    pub async fn get(&self, ctx: &RequestContext, object_id: &str) -> GatewayResult<ObjectStream> {
        let store = self.route(ctx, "get object", object_id).await?;
        let body = store.get(ctx, object_id).await?;
        Ok(ctx.clone().bind_stream(body))
    }

    /// Every object id on every backend, sorted and de-duplicated
    ///
    /// Backends are listed concurrently. The first backend error is
    /// returned after the remaining listings have been cancelled and have
    /// finished.
    #[instrument(skip(self, ctx))]
    pub async fn list_all(&self, ctx: &RequestContext) -> GatewayResult<Vec<String>> {
        let snapshot = self.discovery.list_backends(ctx).await?;
        if snapshot.is_empty() {
            debug!("No backends, nothing to list");
            return Ok(Vec::new());
        }

        let stores = snapshot
            .nodes
            .iter()
            .map(|node| self.connector.connect(node))
            .collect::<GatewayResult<Vec<_>>>()?;

        // Cancelled on the first failure, or when this future is dropped
        let fanout = ctx.child();
        let _cancel_on_drop = fanout.drop_guard();

        let collected = Arc::new(Mutex::new(Vec::new()));
        let (err_tx, mut err_rx) = mpsc::channel(stores.len());
        let mut tasks = JoinSet::new();

        for store in stores {
            let fanout = fanout.clone();
            let collected = collected.clone();
            let err_tx = err_tx.clone();

            tasks.spawn(async move {
                let node_index = store.node().node_index;
                match store.list_all(&fanout).await {
                    Ok(ids) => {
                        debug!(node_index, objects = ids.len(), "Backend listed");
                        collected.lock().extend(ids);
                    }
                    Err(partial) => {
                        let err = partial.into_error();
                        if !fanout.is_cancelled() {
                            warn!(node_index, error = %err, "Backend listing failed");
                        }
                        // Report before cancelling so the root cause is first
                        let _ = err_tx.send(err).await;
                        fanout.cancel();
                    }
                }
            });
        }
        drop(err_tx);

        while let Some(joined) = tasks.join_next().await {
            if let Err(join_err) = joined {
                if join_err.is_panic() {
                    std::panic::resume_unwind(join_err.into_panic());
                }
            }
        }

        if let Ok(err) = err_rx.try_recv() {
            return Err(err);
        }

        let mut ids = std::mem::take(&mut *collected.lock());
        ids.sort();
        ids.dedup();
        info!(backends = snapshot.len(), objects = ids.len(), "Listed objects");
        Ok(ids)
    }

    /// Whether the control plane answers its ping
    pub async fn is_ready(&self, ctx: &RequestContext) -> bool {
        match self.discovery.ping(ctx).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Readiness check failed");
                false
            }
        }
    }
}
