//! Object Storage Façade (§4.6): a minimal opaque blob store, mirroring the Store
//! Adapter's shape for byte payloads rather than JSON documents. Ambient and intentionally
//! thin — only `/api/v1/blobs/*path` depends on it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Metadata about a stored blob, returned on every successful operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobDescriptor {
    pub path: String,
    pub size: usize,
    pub content_type: String,
    pub updated_at: DateTime<Utc>,
}

struct Blob {
    bytes: Vec<u8>,
    content_type: String,
    updated_at: DateTime<Utc>,
}

/// In-process reference implementation of the object-storage façade.
pub struct BlobStore {
    blobs: RwLock<HashMap<String, Blob>>,
}

impl Default for BlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    pub async fn put(&self, path: &str, bytes: Vec<u8>, content_type: String) -> BlobDescriptor {
        let updated_at = Utc::now();
        let size = bytes.len();
        let descriptor = BlobDescriptor {
            path: path.to_string(),
            size,
            content_type: content_type.clone(),
            updated_at,
        };
        self.blobs.write().await.insert(
            path.to_string(),
            Blob {
                bytes,
                content_type,
                updated_at,
            },
        );
        descriptor
    }

    pub async fn get(&self, path: &str) -> Option<(Vec<u8>, BlobDescriptor)> {
        let guard = self.blobs.read().await;
        guard.get(path).map(|blob| {
            (
                blob.bytes.clone(),
                BlobDescriptor {
                    path: path.to_string(),
                    size: blob.bytes.len(),
                    content_type: blob.content_type.clone(),
                    updated_at: blob.updated_at,
                },
            )
        })
    }

    pub async fn delete(&self, path: &str) -> bool {
        self.blobs.write().await.remove(path).is_some()
    }

    pub async fn stat(&self, path: &str) -> Option<BlobDescriptor> {
        let guard = self.blobs.read().await;
        guard.get(path).map(|blob| BlobDescriptor {
            path: path.to_string(),
            size: blob.bytes.len(),
            content_type: blob.content_type.clone(),
            updated_at: blob.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = BlobStore::new();
        store
            .put("images/a.png", vec![1, 2, 3], "image/png".to_string())
            .await;
        let (bytes, descriptor) = store.get("images/a.png").await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(descriptor.size, 3);
        assert_eq!(descriptor.content_type, "image/png");
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = BlobStore::new();
        assert!(store.get("nope").await.is_none());
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let store = BlobStore::new();
        store.put("a", vec![1], "application/octet-stream".to_string()).await;
        assert!(store.delete("a").await);
        assert!(!store.delete("a").await);
    }

    #[tokio::test]
    async fn stat_does_not_return_bytes() {
        let store = BlobStore::new();
        store.put("a", vec![1, 2], "text/plain".to_string()).await;
        let descriptor = store.stat("a").await.unwrap();
        assert_eq!(descriptor.size, 2);
    }
}
