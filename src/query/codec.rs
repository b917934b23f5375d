//! Query URL Codec: translates between [`QueryModel`] and HTTP query-string parameters.
//!
//! Two encodings are supported. The short form spreads conditions across repeated
//! `where=field:operator:value` parameters plus `orderBy`/`limit`/`offset`. The long form
//! packs everything into a single URL-encoded JSON array under `filter`. When both are
//! present in the same request, the long form wins.

use super::{Direction, FilterOperator, QueryModel};
use crate::error::QueryError;
use serde::Deserialize;
use serde_json::Value as Json;
use std::collections::HashMap;

/// One entry of the long-form `filter` JSON array.
#[derive(Debug, Deserialize)]
struct FilterEntry {
    field: String,
    operator: String,
    value: Json,
}

/// Raw query-string parameters as axum's `Query<HashMap<String, String>>` extractor hands
/// them over, except `where` may repeat — callers pass the raw query string's `where`
/// values separately via `wheres` since a flat map can't hold repeated keys.
pub struct RawParams<'a> {
    pub wheres: Vec<&'a str>,
    pub order_by: Option<&'a str>,
    pub limit: Option<&'a str>,
    pub offset: Option<&'a str>,
    pub filter: Option<&'a str>,
}

impl<'a> RawParams<'a> {
    /// Build from the parsed query-string pair list, preserving repeats of `where`.
    pub fn from_pairs(pairs: &'a [(String, String)]) -> Self {
        let mut wheres = Vec::new();
        let mut order_by = None;
        let mut limit = None;
        let mut offset = None;
        let mut filter = None;
        for (k, v) in pairs {
            match k.as_str() {
                "where" => wheres.push(v.as_str()),
                "orderBy" => order_by = Some(v.as_str()),
                "limit" => limit = Some(v.as_str()),
                "offset" => offset = Some(v.as_str()),
                "filter" => filter = Some(v.as_str()),
                _ => {}
            }
        }
        Self {
            wheres,
            order_by,
            limit,
            offset,
            filter,
        }
    }
}

/// Decode query-string parameters into a [`QueryModel`], preferring the long `filter` form
/// when present.
pub fn decode(params: &RawParams) -> Result<QueryModel, QueryError> {
    let mut query = QueryModel::new();

    if let Some(filter_raw) = params.filter {
        let entries: Vec<FilterEntry> = serde_json::from_str(filter_raw)
            .map_err(|e| QueryError::InvalidQueryParams(format!("malformed filter: {e}")))?;
        for entry in entries {
            let op = FilterOperator::from_token(&entry.operator)
                .ok_or_else(|| QueryError::InvalidOperator(entry.operator.clone()))?;
            query = query.where_cond(entry.field, op, entry.value)?;
        }
    } else {
        for raw in &params.wheres {
            query = apply_short_where(query, raw)?;
        }
    }

    if let Some(order_raw) = params.order_by {
        let (field, dir) = parse_order(order_raw);
        query = query.order_by(field, dir);
    }

    if let Some(limit_raw) = params.limit {
        let n: u32 = limit_raw
            .parse()
            .map_err(|_| QueryError::InvalidQueryParams(format!("invalid limit: {limit_raw}")))?;
        query = query.limit(n);
    }

    if let Some(offset_raw) = params.offset {
        let n: u32 = offset_raw
            .parse()
            .map_err(|_| QueryError::InvalidQueryParams(format!("invalid offset: {offset_raw}")))?;
        query = query.offset(n);
    }

    query.validate()?;
    Ok(query)
}

fn apply_short_where(query: QueryModel, raw: &str) -> Result<QueryModel, QueryError> {
    let mut parts = raw.splitn(3, ':');
    let field = parts
        .next()
        .ok_or_else(|| QueryError::InvalidQueryParams(format!("malformed where: {raw}")))?;
    let operator_token = parts
        .next()
        .ok_or_else(|| QueryError::InvalidQueryParams(format!("malformed where: {raw}")))?;
    let value_raw = parts
        .next()
        .ok_or_else(|| QueryError::InvalidQueryParams(format!("malformed where: {raw}")))?;

    let operator = FilterOperator::from_token(operator_token)
        .ok_or_else(|| QueryError::InvalidOperator(operator_token.to_string()))?;
    let value = parse_short_value(value_raw);
    query.where_cond(field, operator, value)
}

fn parse_short_value(raw: &str) -> Json {
    if raw.starts_with('[') && raw.ends_with(']') {
        let inner = &raw[1..raw.len() - 1];
        let items: Vec<Json> = if inner.is_empty() {
            Vec::new()
        } else {
            inner.split(',').map(|v| parse_scalar(v.trim())).collect()
        };
        return Json::Array(items);
    }
    parse_scalar(raw)
}

fn parse_scalar(raw: &str) -> Json {
    if let Ok(n) = raw.parse::<i64>() {
        return Json::Number(n.into());
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(num) = serde_json::Number::from_f64(f) {
            return Json::Number(num);
        }
    }
    match raw {
        "true" => Json::Bool(true),
        "false" => Json::Bool(false),
        "null" => Json::Null,
        _ => Json::String(raw.to_string()),
    }
}

fn parse_order(raw: &str) -> (&str, Direction) {
    match raw.split_once(':') {
        Some((field, "desc")) => (field, Direction::Descending),
        Some((field, _)) => (field, Direction::Ascending),
        None => (raw, Direction::Ascending),
    }
}

/// Encode a [`QueryModel`] into the long-form single `filter` parameter plus the scalar
/// `orderBy`/`limit`/`offset` parameters, used for round-tripping and for client helpers.
pub fn encode_long(query: &QueryModel) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let filter: Vec<Json> = query
        .conditions()
        .iter()
        .map(|c| {
            serde_json::json!({
                "field": c.field,
                "operator": c.operator.token(),
                "value": c.value,
            })
        })
        .collect();
    if !filter.is_empty() {
        out.insert(
            "filter".to_string(),
            serde_json::to_string(&filter).expect("filter entries are always serializable"),
        );
    }
    if let Some((field, dir)) = query.order() {
        let suffix = match dir {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        };
        out.insert("orderBy".to_string(), format!("{field}:{suffix}"));
    }
    if let Some(limit) = query.limit_value() {
        out.insert("limit".to_string(), limit.to_string());
    }
    if let Some(offset) = query.offset_value() {
        out.insert("offset".to_string(), offset.to_string());
    }
    out
}
