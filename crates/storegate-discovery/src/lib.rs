//! storegate-discovery - Find storage backends through the control plane
//!
//! Storage backends are MinIO containers whose name contains a recognition
//! prefix. [`ContainerDiscovery`] lists running containers through a
//! [`ControlPlane`], inspects the matches and turns each one into a
//! [`BackendNode`](storegate_core::BackendNode).
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use storegate_discovery::{ContainerDiscovery, DiscoveryConfig, DockerClient};
//!
//! let docker = DockerClient::from_env()?;
//! let discovery = ContainerDiscovery::new(Arc::new(docker), DiscoveryConfig::default());
//!
//! let snapshot = discovery.list_backends(&ctx).await?;
//! // snapshot.nodes: usable backends, snapshot.skipped: malformed ones
//! ```

pub mod control_plane;
pub mod discovery;
pub mod docker;
pub mod error;

pub use control_plane::{ContainerDetails, ContainerSummary, ControlPlane};
pub use discovery::{ContainerDiscovery, DiscoveryConfig};
pub use docker::DockerClient;
pub use error::{ControlPlaneError, Result};
