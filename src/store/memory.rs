//! In-memory reference implementation of [`StoreAdapter`]
//!
//! Keeps one `HashMap<id, document>` per collection behind a single `RwLock`, and fans
//! every applied mutation out over a `broadcast` channel so `watch` does not need to poll.
//! A production deployment is expected to swap this out for a driver over a real document
//! database; the in-memory adapter exists so the facade is runnable standalone and in
//! tests without one.

use super::{broadcast_to_stream, ChangeEvent, ChangeFeed, ChangeOp, StoreAdapter};
use crate::error::StoreError;
use crate::query::translator::NativeFilter;
use serde_json::Value as Json;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

const CHANGE_FEED_CAPACITY: usize = 4096;

struct Collection {
    documents: HashMap<String, Json>,
}

/// In-memory document store, one [`Collection`] per name, guarded by a single `RwLock` per
/// collection to keep concurrent writers to unrelated collections from blocking each
/// other.
pub struct MemoryStore {
    collections: RwLock<HashMap<String, RwLock<Collection>>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            collections: RwLock::new(HashMap::new()),
            changes: tx,
        }
    }

    async fn ensure_collection(&self, name: &str) {
        let exists = { self.collections.read().await.contains_key(name) };
        if !exists {
            let mut collections = self.collections.write().await;
            collections
                .entry(name.to_string())
                .or_insert_with(|| {
                    RwLock::new(Collection {
                        documents: HashMap::new(),
                    })
                });
        }
    }

    fn with_id(id: &str, mut doc: Json) -> Json {
        if let Json::Object(ref mut map) = doc {
            map.insert("id".to_string(), Json::String(id.to_string()));
        }
        doc
    }

    fn publish(&self, op: ChangeOp, collection: &str, id: &str, full_document: Option<Json>) {
        // No receivers is a normal state (no one is watching yet); ignore the send error.
        let _ = self.changes.send(ChangeEvent {
            op,
            collection: collection.to_string(),
            document_id: id.to_string(),
            full_document,
        });
    }
}

#[async_trait::async_trait]
impl StoreAdapter for MemoryStore {
    async fn add(&self, collection: &str, doc: Json) -> Result<String, StoreError> {
        self.ensure_collection(collection).await;
        let id = Uuid::new_v4().to_string();
        let stored = Self::with_id(&id, doc);
        {
            let collections = self.collections.read().await;
            let coll = collections
                .get(collection)
                .ok_or_else(|| StoreError::Write("collection vanished".to_string()))?;
            coll.write().await.documents.insert(id.clone(), stored.clone());
        }
        self.publish(ChangeOp::Insert, collection, &id, Some(stored));
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Json>, StoreError> {
        let collections = self.collections.read().await;
        let Some(coll) = collections.get(collection) else {
            return Ok(None);
        };
        Ok(coll.read().await.documents.get(id).cloned())
    }

    async fn update(&self, collection: &str, id: &str, patch: Json) -> Result<(), StoreError> {
        self.ensure_collection(collection).await;
        let merged = {
            let collections = self.collections.read().await;
            let coll = collections
                .get(collection)
                .ok_or_else(|| StoreError::Write("collection vanished".to_string()))?;
            let mut guard = coll.write().await;
            let Some(existing) = guard.documents.get(id).cloned() else {
                return Err(StoreError::Write(format!("no document {id}")));
            };
            let merged = shallow_merge(existing, patch);
            guard.documents.insert(id.to_string(), merged.clone());
            merged
        };
        self.publish(ChangeOp::Update, collection, id, Some(merged));
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let removed = {
            let collections = self.collections.read().await;
            let Some(coll) = collections.get(collection) else {
                return Err(StoreError::Write(format!("no document {id}")));
            };
            coll.write().await.documents.remove(id)
        };
        if removed.is_none() {
            return Err(StoreError::Write(format!("no document {id}")));
        }
        self.publish(ChangeOp::Delete, collection, id, None);
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filter: &NativeFilter,
        sort: Option<(&str, i8)>,
        skip: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Vec<Json>, StoreError> {
        let collections = self.collections.read().await;
        let Some(coll) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let guard = coll.read().await;
        let mut matched: Vec<Json> = guard
            .documents
            .values()
            .filter(|doc| super::matches_filter(doc, filter))
            .cloned()
            .collect();

        if let Some((field, dir)) = sort {
            matched.sort_by(|a, b| {
                let av = a.get(field);
                let bv = b.get(field);
                let ord = compare_json(av, bv);
                if dir < 0 {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        let skip = skip.unwrap_or(0) as usize;
        let matched = matched.into_iter().skip(skip);
        Ok(match limit {
            Some(n) => matched.take(n as usize).collect(),
            None => matched.collect(),
        })
    }

    async fn watch(
        &self,
        collection: &str,
        document_id: Option<&str>,
    ) -> Result<ChangeFeed, StoreError> {
        self.ensure_collection(collection).await;
        let rx = self.changes.subscribe();
        Ok(broadcast_to_stream(
            rx,
            collection.to_string(),
            document_id.map(|s| s.to_string()),
        ))
    }
}

fn shallow_merge(base: Json, patch: Json) -> Json {
    match (base, patch) {
        (Json::Object(mut base_map), Json::Object(patch_map)) => {
            for (k, v) in patch_map {
                base_map.insert(k, v);
            }
            Json::Object(base_map)
        }
        (base, _) => base,
    }
}

fn compare_json(a: Option<&Json>, b: Option<&Json>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a.and_then(Json::as_f64), b.and_then(Json::as_f64)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => match (a.and_then(Json::as_str), b.and_then(Json::as_str)) {
            (Some(x), Some(y)) => x.cmp(y),
            _ => Ordering::Equal,
        },
    }
}
