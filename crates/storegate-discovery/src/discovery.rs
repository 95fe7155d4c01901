//! Container-based backend discovery
//!
//! Every call re-queries the control plane; nothing is cached here.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use storegate_core::{
    BackendDiscovery, BackendNode, DiscoverySnapshot, GatewayError, GatewayResult,
    RequestContext, SkippedBackend,
};
use tracing::{debug, info, warn};

use crate::control_plane::{ContainerDetails, ContainerSummary, ControlPlane};
use crate::error::ControlPlaneError;

/// How storage backends are recognised and what they expose
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Substring of the container name marking a storage backend
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    /// Environment variables holding the access key, first match wins
    #[serde(default = "default_access_key_vars")]
    pub access_key_vars: Vec<String>,
    /// Environment variables holding the secret key, first match wins
    #[serde(default = "default_secret_key_vars")]
    pub secret_key_vars: Vec<String>,
    /// S3 port every backend listens on inside the shared network
    #[serde(default = "default_s3_port")]
    pub s3_port: u16,
}

fn default_name_prefix() -> String {
    "amazin-object-storage-node-".to_string()
}

fn default_access_key_vars() -> Vec<String> {
    vec!["MINIO_ACCESS_KEY".to_string(), "MINIO_ROOT_USER".to_string()]
}

fn default_secret_key_vars() -> Vec<String> {
    vec![
        "MINIO_SECRET_KEY".to_string(),
        "MINIO_ROOT_PASSWORD".to_string(),
    ]
}

fn default_s3_port() -> u16 {
    9000
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
            access_key_vars: default_access_key_vars(),
            secret_key_vars: default_secret_key_vars(),
            s3_port: default_s3_port(),
        }
    }
}

/// Parse the node index out of a container name.
///
/// The index is the number right after `prefix`; a trailing replica suffix
/// (`-1` as added by compose) is ignored.
///
/// ```
/// # use storegate_discovery::discovery::parse_node_index;
/// let prefix = "amazin-object-storage-node-";
/// assert_eq!(parse_node_index("/amazin-object-storage-node-3", prefix), Some(3));
/// assert_eq!(parse_node_index("/deployment-amazin-object-storage-node-2-1", prefix), Some(2));
/// assert_eq!(parse_node_index("/amazin-object-storage-node-x", prefix), None);
/// ```
pub fn parse_node_index(name: &str, prefix: &str) -> Option<u32> {
    let name = name.trim_start_matches('/');
    let start = name.find(prefix)? + prefix.len();
    let ordinal = name[start..].split('-').next()?;
    ordinal.parse().ok()
}

/// [`BackendDiscovery`] over a container [`ControlPlane`]
pub struct ContainerDiscovery {
    control_plane: Arc<dyn ControlPlane>,
    config: DiscoveryConfig,
}

impl ContainerDiscovery {
    pub fn new(control_plane: Arc<dyn ControlPlane>, config: DiscoveryConfig) -> Self {
        Self {
            control_plane,
            config,
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Turn inspected metadata into a descriptor, or explain why it can't be
    fn describe(&self, details: &ContainerDetails) -> Result<BackendNode, String> {
        let node_index = parse_node_index(&details.name, &self.config.name_prefix)
            .ok_or_else(|| format!("name '{}' has no numeric node index", details.name))?;

        let access_key = details
            .env_value(&self.config.access_key_vars)
            .ok_or_else(|| "access key variable missing".to_string())?;
        let secret_key = details
            .env_value(&self.config.secret_key_vars)
            .ok_or_else(|| "secret key variable missing".to_string())?;

        let address = details
            .ip_address
            .clone()
            .or_else(|| details.hostname.clone())
            .ok_or_else(|| "no network address".to_string())?;

        Ok(BackendNode {
            node_index,
            address,
            port: self.config.s3_port,
            access_key,
            secret_key,
            container_id: details.id.clone(),
            hostname: details.hostname.clone(),
        })
    }

    fn skip(snapshot: &mut DiscoverySnapshot, summary: &ContainerSummary, name: &str, reason: String) {
        let err = GatewayError::MalformedBackend {
            container: summary.id.clone(),
            reason: reason.clone(),
        };
        warn!(container_id = %summary.id, name = %name, error = %err, "Skipping storage backend");
        snapshot.skipped.push(SkippedBackend {
            container_id: summary.id.clone(),
            name: name.to_string(),
            reason,
        });
    }
}

#[async_trait]
impl BackendDiscovery for ContainerDiscovery {
    async fn list_backends(&self, ctx: &RequestContext) -> GatewayResult<DiscoverySnapshot> {
        let containers = ctx
            .run(async {
                self.control_plane
                    .list_containers()
                    .await
                    .map_err(|e| GatewayError::discovery("list containers", e))
            })
            .await?;

        let matched: Vec<&ContainerSummary> = containers
            .iter()
            .filter(|c| c.name_contains(&self.config.name_prefix))
            .collect();

        debug!(
            containers = containers.len(),
            matched = matched.len(),
            "Listed running containers"
        );

        let inspections = futures::future::join_all(
            matched
                .iter()
                .map(|summary| self.control_plane.inspect_container(&summary.id)),
        );
        let inspected = ctx.run(async { Ok(inspections.await) }).await?;

        let mut snapshot = DiscoverySnapshot::default();
        let mut seen = HashSet::new();

        for (summary, result) in matched.iter().zip(inspected) {
            let details = match result {
                Ok(details) => details,
                Err(ControlPlaneError::ContainerNotFound(_)) => {
                    debug!(container_id = %summary.id, "Container exited before inspection");
                    continue;
                }
                Err(e) => {
                    return Err(GatewayError::discovery(
                        format!("inspect container {}", summary.id),
                        e,
                    ));
                }
            };

            match self.describe(&details) {
                Ok(node) if !seen.insert(node.node_index) => {
                    let reason = format!("duplicate node index {}", node.node_index);
                    Self::skip(&mut snapshot, summary, &details.name, reason);
                }
                Ok(node) => {
                    debug!(
                        container_id = %node.container_id,
                        node_index = node.node_index,
                        address = %node.address,
                        "Discovered storage backend"
                    );
                    snapshot.nodes.push(node);
                }
                Err(reason) => Self::skip(&mut snapshot, summary, &details.name, reason),
            }
        }

        info!(
            nodes = snapshot.nodes.len(),
            skipped = snapshot.skipped.len(),
            "Discovered storage backends"
        );
        Ok(snapshot)
    }

    async fn ping(&self, ctx: &RequestContext) -> GatewayResult<()> {
        ctx.run(async {
            self.control_plane
                .ping()
                .await
                .map_err(|e| GatewayError::discovery("ping control plane", e))
        })
        .await
    }
}
