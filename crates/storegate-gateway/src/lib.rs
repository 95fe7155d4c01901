//! storegate-gateway - Per-request orchestration of discovery, routing and storage
//!
//! The [`Gateway`] holds no routing state. Every operation asks discovery
//! for the current backend set, picks the backend with
//! [`select_backend`](storegate_core::select_backend) and talks to it
//! through a [`StoreConnector`](storegate_core::StoreConnector).
//!
//! ```text
//!            put/get(id)                       list_all
//!                │                                │
//!          ┌─────▼──────┐                  ┌──────▼──────┐
//!          │ discovery  │                  │  discovery  │
//!          └─────┬──────┘                  └──────┬──────┘
//!          ┌─────▼──────┐          ┌──────────────┼──────────────┐
//!          │   router   │          ▼              ▼              ▼
//!          └─────┬──────┘      node 1         node 2   ...   node N
//!          ┌─────▼──────┐          └──────────────┼──────────────┘
//!          │ one node   │                  sorted, de-duplicated
//!          └────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use storegate_gateway::Gateway;
//!
//! let gateway = Gateway::new(discovery, connector);
//! gateway.put(&ctx, "abc", body).await?;
//! let stream = gateway.get(&ctx, "abc").await?;
//! let ids = gateway.list_all(&ctx).await?;
//! ```

mod gateway;

pub use gateway::Gateway;

// Re-export core types for convenience
pub use storegate_core::{GatewayError, GatewayResult, ObjectStream, RequestContext};
