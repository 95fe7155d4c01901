//! Liveness and readiness checks

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Health check response body
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /live
/// The process is up and serving HTTP
pub async fn live() -> Json<HealthResponse> {
    Json(HealthResponse { status: "alive" })
}

/// GET /ready
/// The control plane answers, so requests can be routed
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let ctx = state.request_context();
    let _cancel_on_drop = ctx.drop_guard();

    if state.gateway().is_ready(&ctx).await {
        (StatusCode::OK, Json(HealthResponse { status: "ready" }))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unavailable",
            }),
        )
    }
}
