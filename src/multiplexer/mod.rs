//! Live-Query Multiplexer (§4.4): the long-lived WebSocket channel manager. Authenticates
//! clients via the Auth Core, subscribes them to the Store Adapter's change-feed, and fans
//! changes out with per-channel ordering and backpressure guarantees.

mod channel;
mod protocol;
mod state;

pub use channel::MultiplexerSettings;
pub use state::ChannelTable;

use crate::auth::AuthCore;
use crate::store::StoreAdapter;
use axum::extract::ws::WebSocket;
use std::sync::Arc;

/// Owning component for the live-query surface: wires the store, auth core, and channel
/// table together and exposes a single entry point for accepted WebSocket upgrades.
pub struct Multiplexer {
    store: Arc<dyn StoreAdapter>,
    auth: Arc<AuthCore>,
    table: Arc<ChannelTable>,
    settings: MultiplexerSettings,
}

impl Multiplexer {
    pub fn new(
        store: Arc<dyn StoreAdapter>,
        auth: Arc<AuthCore>,
        max_channels: usize,
        settings: MultiplexerSettings,
    ) -> Self {
        Self {
            store,
            auth,
            table: Arc::new(ChannelTable::new(max_channels)),
            settings,
        }
    }

    /// Take ownership of an accepted WebSocket and drive it until close. Admission
    /// (`MAX_CLIENTS_REACHED`) is enforced inside [`channel::run`].
    pub async fn accept(&self, socket: WebSocket) {
        channel::run(
            socket,
            self.store.clone(),
            self.auth.clone(),
            self.table.clone(),
            self.settings,
        )
        .await;
    }

    pub async fn live_channel_count(&self) -> usize {
        self.table.len().await
    }
}
