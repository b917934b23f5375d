//! Shared state across live channels: the channel table (admission, presence fan-out).
//! Per-connection subscription bookkeeping lives in [`super::channel`].

use super::protocol::ServerMessage;
use chrono::Utc;
use serde_json::Value as Json;
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Bounded outbound queue depth per channel (§5 backpressure). A channel whose consumer
/// cannot keep up is terminated rather than allowed to grow its queue unboundedly.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

struct ChannelEntry {
    user_id: Option<String>,
    sender: mpsc::Sender<ServerMessage>,
}

/// The shared table of live channels, keyed by connection id. Owns admission control and
/// presence fan-out; does not know about subscriptions (those are per-channel).
pub struct ChannelTable {
    channels: RwLock<HashMap<Uuid, ChannelEntry>>,
    max_channels: usize,
}

impl ChannelTable {
    pub fn new(max_channels: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            max_channels,
        }
    }

    /// Attempt to admit a new channel. Returns `None` at capacity.
    pub async fn admit(&self, id: Uuid, sender: mpsc::Sender<ServerMessage>) -> bool {
        let mut guard = self.channels.write().await;
        if guard.len() >= self.max_channels {
            return false;
        }
        guard.insert(
            id,
            ChannelEntry {
                user_id: None,
                sender,
            },
        );
        true
    }

    pub async fn set_user(&self, id: Uuid, user_id: String) {
        if let Some(entry) = self.channels.write().await.get_mut(&id) {
            entry.user_id = Some(user_id);
        }
    }

    pub async fn remove(&self, id: Uuid) {
        self.channels.write().await.remove(&id);
    }

    pub async fn len(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Broadcast a presence update to every *other* authenticated channel (§4.4). The
    /// message carries `from_user_id`, the id of the channel whose presence changed, not
    /// the recipient's.
    pub async fn broadcast_presence(
        &self,
        from: Uuid,
        from_user_id: &str,
        status: &str,
        metadata: Option<Json>,
    ) {
        let guard = self.channels.read().await;
        let last_seen = Utc::now().timestamp_millis();
        for (id, entry) in guard.iter() {
            if *id == from {
                continue;
            }
            if entry.user_id.is_none() {
                continue;
            };
            let message = ServerMessage::Presence {
                user_id: from_user_id.to_string(),
                status: status.to_string(),
                last_seen,
                metadata: metadata.clone(),
            };
            // Best effort: a full or closed queue here is the receiving channel's problem,
            // not the sender's; its own heartbeat/backpressure handling will catch up or
            // terminate it.
            let _ = entry.sender.try_send(message);
        }
    }
}
