//! Object upload, download and listing handlers

use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::validate_object_id;

/// Multipart field carrying the object body
pub const FILE_FIELD: &str = "file";

/// Response for object upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
}

/// Pull the `file` field out of a multipart body
async fn read_file_field(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Bytes, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() == Some(FILE_FIELD) {
            return field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()));
        }
    }

    Err(ApiError::BadRequest(format!(
        "Missing multipart field '{}'",
        FILE_FIELD
    )))
}

/// PUT /object/{id}
/// Store the uploaded file under `id`, replacing any previous object
pub async fn put_object(
    State(state): State<AppState>,
    Path(object_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    validate_object_id(&object_id)?;
    let body = read_file_field(multipart).await?;
    let size = body.len();

    let ctx = state.request_context();
    let _cancel_on_drop = ctx.drop_guard();
    state.gateway().put(&ctx, &object_id, body).await?;

    tracing::info!(object_id = %object_id, size, "Object uploaded");

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: "Object uploaded successfully".to_string(),
        }),
    ))
}

/// GET /object/{id}
/// Stream the object back as `application/octet-stream`
pub async fn get_object(
    State(state): State<AppState>,
    Path(object_id): Path<String>,
) -> Result<Response, ApiError> {
    validate_object_id(&object_id)?;

    let ctx = state.request_context();
    let cancel_on_drop = ctx.drop_guard();
    let stream = state.gateway().get(&ctx, &object_id).await?;
    // The body carries the context from here; the deadline still applies
    let _ = cancel_on_drop.disarm();

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(stream),
    )
        .into_response())
}

/// GET /objects
/// Every object id across all backends
pub async fn list_objects(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let ctx = state.request_context();
    let _cancel_on_drop = ctx.drop_guard();
    let ids = state.gateway().list_all(&ctx).await?;
    Ok(Json(ids))
}
