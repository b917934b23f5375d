//! Document store adapter
//!
//! Opaque façade over the document store that backs every collection. The rest of the
//! crate never touches a storage engine directly; it goes through [`StoreAdapter`]. This
//! module ships one concrete adapter, [`memory::MemoryStore`], an in-process implementation
//! that makes the facade runnable standalone and in tests. A production deployment swaps
//! the adapter for one backed by a real document database and its native change-feed; the
//! trait below is the seam.

pub mod memory;

use crate::error::StoreError;
use crate::query::translator::NativeFilter;
use async_stream::stream;
use futures::Stream;
use serde_json::Value as Json;
use std::pin::Pin;

/// The kind of mutation a change-feed event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Insert,
    Update,
    Replace,
    Delete,
}

/// A single change-feed event.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub op: ChangeOp,
    pub collection: String,
    pub document_id: String,
    /// Full post-image, present for every op except `Delete`.
    pub full_document: Option<Json>,
}

/// A live handle onto a change-feed. Dropping it stops delivery.
pub type ChangeFeed = Pin<Box<dyn Stream<Item = ChangeEvent> + Send>>;

/// Opaque façade over the document store.
///
/// Every method is a suspension point (§5 of the design notes): implementations may block
/// on network I/O and callers must treat every call as potentially yielding.
#[async_trait::async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Insert `doc` into `collection`, assigning and returning a fresh opaque id.
    async fn add(&self, collection: &str, doc: Json) -> Result<String, StoreError>;

    /// Fetch a single document by id. Returns `None` for both "no such id" and "id in a
    /// shape the underlying store does not recognize" — callers treat these identically.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Json>, StoreError>;

    /// Shallow-merge `patch` into the stored document at the top level. Nested mappings
    /// are replaced wholesale, not deep-merged. Keys absent from `patch` are left alone;
    /// `null`-valued keys in `patch` are stored as explicit nulls.
    async fn update(&self, collection: &str, id: &str, patch: Json) -> Result<(), StoreError>;

    /// Remove a document by id. Does not distinguish "no such id" from "removed".
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Execute a translated query and return matching documents, each carrying `id`.
    async fn query(
        &self,
        collection: &str,
        filter: &NativeFilter,
        sort: Option<(&str, i8)>,
        skip: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Vec<Json>, StoreError>;

    /// Open a change-feed over `collection`, optionally narrowed to a single document id.
    /// The returned stream yields events until dropped or the adapter is closed.
    async fn watch(
        &self,
        collection: &str,
        document_id: Option<&str>,
    ) -> Result<ChangeFeed, StoreError>;
}

/// Apply a [`NativeFilter`] to a single document in-process. Shared by the in-memory
/// adapter's `query` and by live-query predicate evaluation in the multiplexer, since both
/// need to decide "does this document match this translated filter" without a real
/// database behind them.
pub fn matches_filter(doc: &Json, filter: &NativeFilter) -> bool {
    use crate::query::translator::NativeFilter::*;
    match filter {
        And(filters) => filters.iter().all(|f| matches_filter(doc, f)),
        Field { field, op } => {
            let value = lookup_field(doc, field);
            op.matches(value)
        }
        Empty => true,
    }
}

fn lookup_field<'a>(doc: &'a Json, field: &str) -> Option<&'a Json> {
    doc.as_object().and_then(|m| m.get(field))
}

/// Wraps a `Vec<ChangeEvent>` broadcast receiver as a `Stream`, used by the in-memory
/// adapter. Kept separate so other adapters backed by a real async driver stream can
/// implement `watch` without this helper.
pub(crate) fn broadcast_to_stream(
    mut rx: tokio::sync::broadcast::Receiver<ChangeEvent>,
    collection: String,
    document_id: Option<String>,
) -> ChangeFeed {
    Box::pin(stream! {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    if ev.collection != collection {
                        continue;
                    }
                    if let Some(id) = &document_id {
                        if &ev.document_id != id {
                            continue;
                        }
                    }
                    yield ev;
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
