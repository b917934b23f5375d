//! The `{status: "success"|"error", ...}` JSON envelope every HTTP response uses (§6).
//! HTTP status is always 200; callers dispatch on `status`.

use crate::error::ApiError;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::{json, Value};

/// Wrap a successful payload in `{status:"success", ...payload fields merged in...}`.
pub fn success(payload: Value) -> Response {
    let mut body = json!({ "status": "success" });
    if let Value::Object(ref mut map) = body {
        if let Value::Object(fields) = payload {
            map.extend(fields);
        }
    }
    Json(body).into_response()
}

/// Serialize any [`Serialize`] value as the success payload.
pub fn success_value<T: Serialize>(value: &T) -> Response {
    match serde_json::to_value(value) {
        Ok(payload) => success(payload),
        Err(e) => failure(&ApiError::internal(format!("failed to serialize response: {e}"))),
    }
}

/// Wrap an [`ApiError`] in `{status:"error", code, message}`. Never leaks internal detail
/// for `ApiError::Internal` — its `Display` is the fixed "internal server error" string.
pub fn failure(err: &ApiError) -> Response {
    Json(json!({
        "status": "error",
        "code": err.code(),
        "message": err.to_string(),
    }))
    .into_response()
}

pub type ApiResult = Result<Response, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        failure(&self)
    }
}
