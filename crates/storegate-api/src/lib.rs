//! storegate-api - HTTP API layer for the storegate router
//!
//! Thin axum transport over [`Gateway`](storegate_gateway::Gateway): it
//! validates ids, unpacks multipart uploads, gives every request a
//! deadline and maps gateway error kinds to status codes.
//!
//! # Usage
//!
//! ```ignore
//! use storegate_api::{create_router, AppState};
//!
//! let state = AppState::new(gateway).with_request_timeout(timeout);
//! let router = create_router(state);
//! ```

pub mod error;
pub mod handlers;
pub mod state;
pub mod validation;

pub use error::ApiError;
pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the storegate router with the given application state
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health checks
        .route("/live", get(handlers::health::live))
        .route("/ready", get(handlers::health::ready))
        // Objects
        .route(
            "/object/{id}",
            get(handlers::objects::get_object).put(handlers::objects::put_object),
        )
        .route("/objects", get(handlers::objects::list_objects))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
