//! Per-connection state machine: authenticates, serves `watch_document`/`watch_collection`
//! subscriptions, answers heartbeats, and fans out presence (§4.4).

use super::protocol::{
    change_kind, ChangeItem, ClientMessage, CollectionChange, ServerMessage, StructuredQuery,
};
use super::state::{ChannelTable, OUTBOUND_QUEUE_CAPACITY};
use crate::auth::{AuthCore, TokenType};
use crate::query::translator::translate;
use crate::query::QueryModel;
use crate::store::{ChangeOp, StoreAdapter};
use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde_json::Value as Json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Ready,
    Closed,
}

/// Tunables threaded through from [`crate::config::Config`].
#[derive(Clone, Copy)]
pub struct MultiplexerSettings {
    pub heartbeat_interval: Duration,
    pub ping_timeout: Duration,
}

/// Drive one accepted WebSocket connection to completion. Removes itself from `table` on
/// exit regardless of how the connection ended.
pub async fn run(
    socket: WebSocket,
    store: Arc<dyn StoreAdapter>,
    auth: Arc<AuthCore>,
    table: Arc<ChannelTable>,
    settings: MultiplexerSettings,
) {
    let id = Uuid::new_v4();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_QUEUE_CAPACITY);

    if !table.admit(id, outbound_tx.clone()).await {
        let (mut tx, _rx) = socket.split();
        let msg = ServerMessage::Error {
            request_id: None,
            code: "MAX_CLIENTS_REACHED",
            message: "maximum number of clients reached".to_string(),
        };
        let _ = send_json(&mut tx, &msg).await;
        let _ = tx.close().await;
        return;
    }
    info!(channel_id = %id, "live channel accepted");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let _ = send_json(&mut ws_tx, &ServerMessage::Connected { request_id: None }).await;

    let last_received = StdMutex::new(Instant::now());
    let mut state = State::Open;
    let mut user_id: Option<String> = None;
    let mut subscriptions: HashMap<String, AbortHandle> = HashMap::new();

    let send_loop = async {
        let mut heartbeat = tokio::time::interval(settings.heartbeat_interval);
        heartbeat.tick().await; // first tick fires immediately; skip it
        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    let elapsed = last_received.lock().unwrap().elapsed();
                    if elapsed > settings.heartbeat_interval + settings.ping_timeout {
                        warn!(channel_id = %id, "heartbeat timeout, closing channel");
                        break;
                    }
                    if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
                outgoing = outbound_rx.recv() => {
                    let Some(message) = outgoing else { break };
                    if send_json(&mut ws_tx, &message).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = ws_tx.close().await;
    };

    let receive_loop = async {
        while let Some(frame) = ws_rx.next().await {
            let Ok(frame) = frame else { break };
            *last_received.lock().unwrap() = Instant::now();
            match frame {
                Message::Text(text) => {
                    handle_client_message(
                        &text,
                        id,
                        &mut state,
                        &mut user_id,
                        &mut subscriptions,
                        &store,
                        &auth,
                        &table,
                        &outbound_tx,
                    )
                    .await;
                    if state == State::Closed {
                        break;
                    }
                }
                Message::Pong(_) => continue,
                Message::Ping(_) => continue,
                Message::Close(_) => break,
                Message::Binary(_) => continue,
            }
        }
    };

    tokio::select! {
        _ = send_loop => {}
        _ = receive_loop => {}
    }

    for (_, handle) in subscriptions.drain() {
        handle.abort();
    }
    table.remove(id).await;
    if let Some(uid) = &user_id {
        table.broadcast_presence(id, uid, "offline", None).await;
        debug!(channel_id = %id, user_id = %uid, "channel closed, offline presence broadcast");
    }
    info!(channel_id = %id, "live channel closed");
}

#[allow(clippy::too_many_arguments)]
async fn handle_client_message(
    text: &str,
    id: Uuid,
    state: &mut State,
    user_id: &mut Option<String>,
    subscriptions: &mut HashMap<String, AbortHandle>,
    store: &Arc<dyn StoreAdapter>,
    auth: &Arc<AuthCore>,
    table: &Arc<ChannelTable>,
    outbound_tx: &mpsc::Sender<ServerMessage>,
) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            let _ = outbound_tx
                .send(ServerMessage::Error {
                    request_id: None,
                    code: "INVALID_MESSAGE",
                    message: format!("malformed client message: {e}"),
                })
                .await;
            return;
        }
    };

    if *state == State::Open {
        let ClientMessage::Auth { request_id, token } = message else {
            let _ = outbound_tx
                .send(ServerMessage::Error {
                    request_id: None,
                    code: "UNAUTHORIZED",
                    message: "channel is not authenticated".to_string(),
                })
                .await;
            return;
        };
        match auth.verify_token(&token, TokenType::Access).await {
            Ok(claims) => {
                *state = State::Ready;
                *user_id = Some(claims.sub.clone());
                table.set_user(id, claims.sub.clone()).await;
                let _ = outbound_tx
                    .send(ServerMessage::Auth {
                        request_id,
                        status: "success",
                        user_id: Some(claims.sub),
                    })
                    .await;
            }
            Err(e) => {
                let _ = outbound_tx
                    .send(ServerMessage::Error {
                        request_id: Some(request_id),
                        code: e.code(),
                        message: e.to_string(),
                    })
                    .await;
                *state = State::Closed;
            }
        }
        return;
    }

    match message {
        ClientMessage::Auth { request_id, .. } => {
            let _ = outbound_tx
                .send(ServerMessage::Error {
                    request_id: Some(request_id),
                    code: "INVALID_MESSAGE",
                    message: "already authenticated".to_string(),
                })
                .await;
        }
        ClientMessage::WatchDocument {
            request_id: _,
            collection,
            document_id,
        } => {
            let subscription_id = Uuid::new_v4().to_string();
            let handle = spawn_watch_document(
                store.clone(),
                collection,
                document_id,
                subscription_id.clone(),
                outbound_tx.clone(),
            );
            subscriptions.insert(subscription_id, handle);
        }
        ClientMessage::WatchCollection {
            request_id,
            collection,
            query,
        } => match build_query(query) {
            Ok(q) => {
                let subscription_id = Uuid::new_v4().to_string();
                let handle = spawn_watch_collection(
                    store.clone(),
                    collection,
                    q,
                    subscription_id.clone(),
                    outbound_tx.clone(),
                );
                subscriptions.insert(subscription_id, handle);
            }
            Err(e) => {
                let _ = outbound_tx
                    .send(ServerMessage::Error {
                        request_id: Some(request_id),
                        code: e.code(),
                        message: e.to_string(),
                    })
                    .await;
            }
        },
        ClientMessage::Unwatch {
            request_id: _,
            subscription_id,
        } => {
            if let Some(handle) = subscriptions.remove(&subscription_id) {
                handle.abort();
            }
            // Unknown ids are ignored: unwatch is idempotent (§8).
        }
        ClientMessage::Presence {
            request_id: _,
            action: _,
            status,
            metadata,
        } => {
            if let Some(uid) = user_id.as_deref() {
                table.broadcast_presence(id, uid, &status, metadata).await;
            }
        }
    }
}

fn build_query(query: Option<StructuredQuery>) -> Result<QueryModel, crate::error::QueryError> {
    let Some(query) = query else {
        return Ok(QueryModel::new());
    };
    let mut model = QueryModel::new();
    for cond in &query.conditions {
        let operator = cond.operator().ok_or_else(|| {
            crate::error::QueryError::InvalidOperator(cond.operator.clone())
        })?;
        model = model.where_cond(cond.field.clone(), operator, cond.value.clone())?;
    }
    for order in &query.order_by {
        model = model.order_by(order.field.clone(), order.direction());
    }
    if let Some(limit) = query.limit {
        model = model.limit(limit);
    }
    model.validate()?;
    Ok(model)
}

fn spawn_watch_document(
    store: Arc<dyn StoreAdapter>,
    collection: String,
    document_id: String,
    subscription_id: String,
    outbound_tx: mpsc::Sender<ServerMessage>,
) -> AbortHandle {
    let task = tokio::spawn(async move {
        let mut exists = match store.get(&collection, &document_id).await {
            Ok(Some(doc)) => {
                let item = ChangeItem {
                    kind: "added",
                    document_id: document_id.clone(),
                    data: Some(doc),
                    timestamp: Utc::now(),
                };
                if outbound_tx
                    .send(ServerMessage::WatchDocument {
                        subscription_id: subscription_id.clone(),
                        change: item,
                    })
                    .await
                    .is_err()
                {
                    return;
                }
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(%collection, %document_id, error = %e, "watch_document initial read failed");
                return;
            }
        };

        let feed = match store.watch(&collection, Some(&document_id)).await {
            Ok(feed) => feed,
            Err(e) => {
                warn!(%collection, %document_id, error = %e, "watch_document failed to open change feed");
                return;
            }
        };
        tokio::pin!(feed);

        while let Some(ev) = feed.next().await {
            let (kind, data): (&'static str, Option<Json>) = if ev.op == ChangeOp::Delete {
                if !exists {
                    continue;
                }
                exists = false;
                ("removed", None)
            } else {
                match store.get(&collection, &document_id).await {
                    Ok(Some(doc)) => {
                        let kind = if exists { change_kind(ev.op) } else { "added" };
                        exists = true;
                        (kind, Some(doc))
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(error = %e, "watch_document refresh read failed");
                        continue;
                    }
                }
            };
            let item = ChangeItem {
                kind,
                document_id: document_id.clone(),
                data,
                timestamp: Utc::now(),
            };
            if outbound_tx
                .send(ServerMessage::WatchDocument {
                    subscription_id: subscription_id.clone(),
                    change: item,
                })
                .await
                .is_err()
            {
                break;
            }
        }
    });
    task.abort_handle()
}

fn spawn_watch_collection(
    store: Arc<dyn StoreAdapter>,
    collection: String,
    query: QueryModel,
    subscription_id: String,
    outbound_tx: mpsc::Sender<ServerMessage>,
) -> AbortHandle {
    let task = tokio::spawn(async move {
        let (filter, sort, offset, limit) = translate(&query);
        let initial = match store
            .query(&collection, &filter, sort.as_ref().map(|(f, d)| (f.as_str(), *d)), offset, limit)
            .await
        {
            Ok(docs) => docs,
            Err(e) => {
                warn!(%collection, error = %e, "watch_collection initial query failed");
                return;
            }
        };

        let mut tracked: HashSet<String> = HashSet::new();
        let mut changes = Vec::with_capacity(initial.len());
        for doc in &initial {
            if let Some(doc_id) = doc.get("id").and_then(Json::as_str) {
                tracked.insert(doc_id.to_string());
                changes.push(ChangeItem {
                    kind: "added",
                    document_id: doc_id.to_string(),
                    data: Some(doc.clone()),
                    timestamp: Utc::now(),
                });
            }
        }
        if !changes.is_empty()
            && outbound_tx
                .send(ServerMessage::WatchCollection {
                    subscription_id: subscription_id.clone(),
                    change: CollectionChange {
                        kind: "added",
                        changes,
                        timestamp: Utc::now(),
                    },
                })
                .await
                .is_err()
        {
            return;
        }

        let feed = match store.watch(&collection, None).await {
            Ok(feed) => feed,
            Err(e) => {
                warn!(%collection, error = %e, "watch_collection failed to open change feed");
                return;
            }
        };
        tokio::pin!(feed);

        while let Some(ev) = feed.next().await {
            let item = if ev.op == ChangeOp::Delete {
                if !tracked.remove(&ev.document_id) {
                    continue;
                }
                Some(ChangeItem {
                    kind: "removed",
                    document_id: ev.document_id.clone(),
                    data: None,
                    timestamp: Utc::now(),
                })
            } else {
                match store.get(&collection, &ev.document_id).await {
                    Ok(Some(doc)) => {
                        if crate::store::matches_filter(&doc, &filter) {
                            let kind = if tracked.insert(ev.document_id.clone()) {
                                "added"
                            } else {
                                "modified"
                            };
                            Some(ChangeItem {
                                kind,
                                document_id: ev.document_id.clone(),
                                data: Some(doc),
                                timestamp: Utc::now(),
                            })
                        } else if tracked.remove(&ev.document_id) {
                            Some(ChangeItem {
                                kind: "removed",
                                document_id: ev.document_id.clone(),
                                data: None,
                                timestamp: Utc::now(),
                            })
                        } else {
                            None
                        }
                    }
                    Ok(None) => None,
                    Err(e) => {
                        warn!(error = %e, "watch_collection refresh read failed");
                        None
                    }
                }
            };
            let Some(item) = item else { continue };
            let sent = outbound_tx
                .send(ServerMessage::WatchCollection {
                    subscription_id: subscription_id.clone(),
                    change: CollectionChange {
                        kind: item.kind,
                        changes: vec![item],
                        timestamp: Utc::now(),
                    },
                })
                .await;
            if sent.is_err() {
                break;
            }
        }
    });
    task.abort_handle()
}

async fn send_json(
    tx: &mut futures::stream::SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(message).expect("ServerMessage always serializes");
    tx.send(Message::Text(text.into())).await
}
