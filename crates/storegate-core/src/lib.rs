//! storegate-core - Core traits and types for the storegate router
//!
//! This crate holds the pieces every other storegate crate agrees on:
//! the backend node descriptor, the error taxonomy, the deterministic
//! router, the per-request cancellation context and the traits that
//! discovery and storage client implementations plug into.

pub mod backend;
pub mod cache;
pub mod context;
pub mod error;
pub mod node;
pub mod routing;
pub mod testing;

pub use backend::{BackendDiscovery, ObjectStore, ObjectStream, PartialListing, StoreConnector};
pub use cache::CachingDiscovery;
pub use context::RequestContext;
pub use error::{ErrorKind, GatewayError, GatewayResult};
pub use node::{BackendNode, DiscoverySnapshot, SkippedBackend};
pub use routing::select_backend;
