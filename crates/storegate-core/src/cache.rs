//! Optional short-lived discovery cache
//!
//! [`CachingDiscovery`] keeps the last successful snapshot for a fixed TTL.
//! Within that window every request handled by this process sees the same
//! backend set, so a write and a later read of the same id through this
//! process land on the same backend. Snapshots can be up to one TTL stale
//! relative to the control plane. Errors are never cached, and the lock is
//! never held while the inner discovery runs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::backend::BackendDiscovery;
use crate::context::RequestContext;
use crate::error::GatewayResult;
use crate::node::DiscoverySnapshot;

/// TTL cache in front of another [`BackendDiscovery`]
pub struct CachingDiscovery {
    inner: Arc<dyn BackendDiscovery>,
    ttl: Duration,
    cached: Mutex<Option<(Instant, DiscoverySnapshot)>>,
}

impl CachingDiscovery {
    pub fn new(inner: Arc<dyn BackendDiscovery>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cached: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drop the cached snapshot
    pub fn invalidate(&self) {
        *self.cached.lock() = None;
    }

    fn fresh(&self) -> Option<DiscoverySnapshot> {
        let cached = self.cached.lock();
        match cached.as_ref() {
            Some((fetched_at, snapshot)) if fetched_at.elapsed() < self.ttl => {
                Some(snapshot.clone())
            }
            _ => None,
        }
    }
}

#[async_trait]
impl BackendDiscovery for CachingDiscovery {
    async fn list_backends(&self, ctx: &RequestContext) -> GatewayResult<DiscoverySnapshot> {
        if let Some(snapshot) = self.fresh() {
            debug!(nodes = snapshot.len(), "Using cached discovery snapshot");
            return Ok(snapshot);
        }

        let snapshot = self.inner.list_backends(ctx).await?;
        *self.cached.lock() = Some((Instant::now(), snapshot.clone()));
        Ok(snapshot)
    }

    async fn ping(&self, ctx: &RequestContext) -> GatewayResult<()> {
        self.inner.ping(ctx).await
    }
}
