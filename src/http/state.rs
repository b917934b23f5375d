//! Shared application state threaded through every handler via [`axum::extract::State`].

use crate::auth::AuthCore;
use crate::blob::BlobStore;
use crate::multiplexer::Multiplexer;
use crate::store::StoreAdapter;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StoreAdapter>,
    pub auth: Arc<AuthCore>,
    pub blobs: Arc<BlobStore>,
    pub multiplexer: Arc<Multiplexer>,
}
