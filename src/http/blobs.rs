//! `/api/v1/blobs/*path` handlers — thin routing into the Object Storage Façade (§4.6).

use super::envelope::{success, ApiResult};
use super::state::AppState;
use crate::error::ApiError;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use serde_json::json;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub async fn put_blob(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    bytes: Bytes,
) -> ApiResult {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();
    let descriptor = state.blobs.put(&path, bytes.to_vec(), content_type).await;
    Ok(success(json!({
        "path": descriptor.path,
        "size": descriptor.size,
        "contentType": descriptor.content_type,
        "updatedAt": descriptor.updated_at,
    })))
}

pub async fn get_blob(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match state.blobs.get(&path).await {
        Some((bytes, descriptor)) => {
            let mut headers = HeaderMap::new();
            if let Ok(value) = descriptor.content_type.parse() {
                headers.insert(axum::http::header::CONTENT_TYPE, value);
            }
            Ok((headers, bytes))
        }
        None => Err(ApiError::DocumentNotFound),
    }
}

pub async fn delete_blob(State(state): State<AppState>, Path(path): Path<String>) -> ApiResult {
    if !state.blobs.delete(&path).await {
        return Err(ApiError::DocumentNotFound);
    }
    Ok(success(json!({ "path": path })))
}
