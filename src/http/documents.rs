//! `/api/v1/:collection[/:id]` handlers: routing into the Query Model/Translator and the
//! Store Adapter. The `latest` path segment is never a real id (§9).

use super::envelope::{success, ApiResult};
use super::state::AppState;
use crate::error::ApiError;
use crate::query::codec::{decode, RawParams};
use crate::query::translator::translate;
use axum::extract::{Path, RawQuery, State};
use axum::Json;
use serde_json::{json, Value};

const MAGIC_LATEST_ID: &str = "latest";

/// Split a raw URL query string into key/value pairs, preserving repeated keys (`where`
/// may appear any number of times) — `axum::extract::Query`'s flat-map deserialization
/// can't represent that, so the codec consumes pairs directly.
fn parse_query_string(raw: &Option<String>) -> Vec<(String, String)> {
    let Some(raw) = raw else { return Vec::new() };
    url::form_urlencoded::parse(raw.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

pub async fn query_collection(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    RawQuery(raw): RawQuery,
) -> ApiResult {
    let pairs = parse_query_string(&raw);
    let params = RawParams::from_pairs(&pairs);
    let model = decode(&params)?;
    let (filter, sort, offset, limit) = translate(&model);
    let docs = state
        .store
        .query(&collection, &filter, sort.as_ref().map(|(f, d)| (f.as_str(), *d)), offset, limit)
        .await?;
    let results: Vec<Value> = docs
        .into_iter()
        .map(|doc| {
            let id = doc.get("id").cloned().unwrap_or(Value::Null);
            json!({ "id": id, "data": doc })
        })
        .collect();
    Ok(success(json!({ "results": results })))
}

pub async fn create_document(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(doc): Json<Value>,
) -> ApiResult {
    let id = state.store.add(&collection, doc).await?;
    Ok(success(json!({ "id": id, "path": format!("{collection}/{id}") })))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> ApiResult {
    if id == MAGIC_LATEST_ID {
        return Err(ApiError::DocumentNotFound);
    }
    let doc = state.store.get(&collection, &id).await?;
    match doc {
        Some(data) => Ok(success(json!({ "id": id, "path": format!("{collection}/{id}"), "data": data }))),
        None => Err(ApiError::DocumentNotFound),
    }
}

pub async fn update_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(patch): Json<Value>,
) -> ApiResult {
    if id == MAGIC_LATEST_ID || state.store.get(&collection, &id).await?.is_none() {
        return Err(ApiError::DocumentNotFound);
    }
    state.store.update(&collection, &id, patch).await?;
    Ok(success(json!({ "id": id, "path": format!("{collection}/{id}") })))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> ApiResult {
    if id == MAGIC_LATEST_ID || state.store.get(&collection, &id).await?.is_none() {
        return Err(ApiError::DocumentNotFound);
    }
    state.store.delete(&collection, &id).await?;
    Ok(success(json!({ "id": id, "path": format!("{collection}/{id}") })))
}
