//! `/api/v1/auth/*` handlers: thin routing into [`crate::auth::AuthCore`].

use super::envelope::{success, ApiResult};
use super::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

pub async fn register(State(state): State<AppState>, Json(req): Json<RegisterRequest>) -> ApiResult {
    let record = state
        .auth
        .create_user(&req.email, &req.password, req.display_name, req.photo_url)
        .await?;
    Ok(success(json!({
        "id": record.id,
        "email": record.email,
        "displayName": record.display_name,
    })))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> ApiResult {
    let bundle = state.auth.sign_in(&req.email, &req.password).await?;
    Ok(success(serde_json::to_value(bundle).expect("TokenBundle always serializes")))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

pub async fn refresh(State(state): State<AppState>, Json(req): Json<RefreshRequest>) -> ApiResult {
    let bundle = state.auth.refresh(&req.refresh_token).await?;
    Ok(success(serde_json::to_value(bundle).expect("TokenBundle always serializes")))
}
