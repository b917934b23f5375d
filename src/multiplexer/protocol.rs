//! Wire messages for the live-query channel: tagged unions discriminated by `type`
//! (§9 "Polymorphic messages" — explicit case handling, no dynamic dispatch).

use crate::query::{Direction, FilterOperator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// One `{field,operator,value}` entry of a structured `watch_collection` query.
#[derive(Debug, Clone, Deserialize)]
pub struct StructuredCondition {
    pub field: String,
    pub operator: String,
    pub value: Json,
}

impl StructuredCondition {
    pub fn operator(&self) -> Option<FilterOperator> {
        FilterOperator::from_token(&self.operator)
    }
}

/// One `{field,direction}` entry of a structured `orderBy`.
#[derive(Debug, Clone, Deserialize)]
pub struct StructuredOrder {
    pub field: String,
    pub direction: String,
}

impl StructuredOrder {
    pub fn direction(&self) -> Direction {
        if self.direction.eq_ignore_ascii_case("desc") {
            Direction::Descending
        } else {
            Direction::Ascending
        }
    }
}

/// The structured query carried by `watch_collection`, mirroring the Query Model but
/// deserialized straight from JSON rather than built through the fluent API.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StructuredQuery {
    #[serde(default, rename = "where")]
    pub conditions: Vec<StructuredCondition>,
    #[serde(default, rename = "orderBy")]
    pub order_by: Vec<StructuredOrder>,
    pub limit: Option<u32>,
}

/// Messages a client may send over the live channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Auth {
        #[serde(rename = "requestId")]
        request_id: String,
        token: String,
    },
    WatchDocument {
        #[serde(rename = "requestId")]
        request_id: String,
        collection: String,
        #[serde(rename = "documentId")]
        document_id: String,
    },
    WatchCollection {
        #[serde(rename = "requestId")]
        request_id: String,
        collection: String,
        #[serde(default)]
        query: Option<StructuredQuery>,
    },
    Unwatch {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "subscriptionId")]
        subscription_id: String,
    },
    Presence {
        #[serde(rename = "requestId")]
        request_id: String,
        action: String,
        status: String,
        #[serde(default)]
        metadata: Option<Json>,
    },
}

/// One document-level change, as delivered inside a `watch_document` event or nested
/// inside a `watch_collection` event's `changes` array.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeItem {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub document_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Json>,
    pub timestamp: DateTime<Utc>,
}

/// Messages the server may send over the live channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    Auth {
        #[serde(rename = "requestId")]
        request_id: String,
        status: &'static str,
        #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },
    WatchDocument {
        #[serde(rename = "subscriptionId")]
        subscription_id: String,
        change: ChangeItem,
    },
    WatchCollection {
        #[serde(rename = "subscriptionId")]
        subscription_id: String,
        change: CollectionChange,
    },
    Presence {
        #[serde(rename = "userId")]
        user_id: String,
        status: String,
        #[serde(rename = "lastSeen")]
        last_seen: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<Json>,
    },
    Error {
        #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        code: &'static str,
        message: String,
    },
}

/// The `changes` payload of a `watch_collection` event. `kind` mirrors the change kind of
/// the batch (the initial snapshot is always `added`; a post-subscription batch always
/// carries one underlying store event, hence one kind).
#[derive(Debug, Clone, Serialize)]
pub struct CollectionChange {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub changes: Vec<ChangeItem>,
    pub timestamp: DateTime<Utc>,
}

/// Map a store-level change op onto the three wire change kinds (§4.4 "Change-type
/// mapping").
pub fn change_kind(op: crate::store::ChangeOp) -> &'static str {
    use crate::store::ChangeOp::*;
    match op {
        Insert => "added",
        Update | Replace => "modified",
        Delete => "removed",
    }
}
