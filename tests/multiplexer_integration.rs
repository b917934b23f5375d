//! End-to-end exercises of the live-query channel over a real WebSocket connection: a
//! `tokio-tungstenite` client against an `axum::serve` instance bound to an ephemeral
//! port, driving the multiplexer exactly as a browser client would (§4.4, §8 scenarios
//! 4-6).

use futures::{SinkExt, StreamExt};
use phoenixstore::auth::{AuthCore, AuthSettings, JwtSecret};
use phoenixstore::blob::BlobStore;
use phoenixstore::http::{router, AppState};
use phoenixstore::multiplexer::{Multiplexer, MultiplexerSettings};
use phoenixstore::store::memory::MemoryStore;
use phoenixstore::store::StoreAdapter;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

struct TestServer {
    ws_url: String,
    store: Arc<MemoryStore>,
    auth: Arc<AuthCore>,
}

async fn spawn_server() -> TestServer {
    let store = Arc::new(MemoryStore::new());
    let auth = Arc::new(AuthCore::new(
        store.clone(),
        JwtSecret::new("ws-integration-test-secret"),
        AuthSettings::default(),
    ));
    let blobs = Arc::new(BlobStore::new());
    let multiplexer = Arc::new(Multiplexer::new(
        store.clone(),
        auth.clone(),
        10_000,
        MultiplexerSettings {
            heartbeat_interval: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(5),
        },
    ));
    let state = AppState {
        store: store.clone(),
        auth: auth.clone(),
        blobs,
        multiplexer,
    };
    let app = router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        ws_url: format!("ws://{addr}/ws"),
        store,
        auth,
    }
}

async fn connect(url: &str) -> WsStream {
    let (stream, _) = connect_async(url).await.expect("client handshake");
    stream
}

async fn send_json(stream: &mut WsStream, value: Value) {
    stream
        .send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

/// Read frames until a `Text` frame arrives, skipping control frames.
async fn recv_json(stream: &mut WsStream) -> Value {
    loop {
        match stream.next().await.expect("stream ended unexpectedly").unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

struct Authenticated {
    access_token: String,
    user_id: String,
}

async fn authenticate(stream: &mut WsStream, auth: &AuthCore, email: &str) -> Authenticated {
    let user = auth
        .create_user(email, "Str0ng!Pass", None, None)
        .await
        .unwrap();
    let bundle = auth.sign_in(email, "Str0ng!Pass").await.unwrap();

    let connected = recv_json(stream).await;
    assert_eq!(connected["type"], "connected");

    send_json(
        stream,
        json!({"type": "auth", "requestId": "r1", "token": bundle.access_token}),
    )
    .await;
    let reply = recv_json(stream).await;
    assert_eq!(reply["type"], "auth");
    assert_eq!(reply["status"], "success");
    Authenticated {
        access_token: bundle.access_token,
        user_id: user.id,
    }
}

#[tokio::test]
async fn document_watch_sees_initial_snapshot_then_one_modified_then_stops_after_unwatch() {
    let server = spawn_server().await;
    let mut client = connect(&server.ws_url).await;
    authenticate(&mut client, &server.auth, "watcher@example.com").await;

    let id = server
        .store
        .add("widgets", json!({"name": "Test User"}))
        .await
        .unwrap();

    send_json(
        &mut client,
        json!({
            "type": "watch_document",
            "requestId": "r2",
            "collection": "widgets",
            "documentId": id,
        }),
    )
    .await;

    let initial = recv_json(&mut client).await;
    assert_eq!(initial["type"], "watch_document");
    assert_eq!(initial["change"]["type"], "added");
    assert_eq!(initial["change"]["data"]["name"], "Test User");
    let subscription_id = initial["subscriptionId"].as_str().unwrap().to_string();

    server
        .store
        .update("widgets", &id, json!({"name": "Updated User"}))
        .await
        .unwrap();

    let modified = recv_json(&mut client).await;
    assert_eq!(modified["change"]["type"], "modified");
    assert_eq!(modified["change"]["data"]["name"], "Updated User");

    send_json(
        &mut client,
        json!({"type": "unwatch", "requestId": "r3", "subscriptionId": subscription_id}),
    )
    .await;

    // unwatch is fire-and-forget (no response); give the abort a moment to land, then
    // confirm a further update produces no further watch_document message.
    tokio::time::sleep(Duration::from_millis(50)).await;
    server
        .store
        .update("widgets", &id, json!({"name": "Ignored"}))
        .await
        .unwrap();

    let raced = tokio::time::timeout(Duration::from_millis(200), recv_json(&mut client)).await;
    assert!(raced.is_err(), "expected no further events after unwatch");
}

#[tokio::test]
async fn collection_watch_initial_snapshot_respects_predicate_and_order() {
    let server = spawn_server().await;
    let mut client = connect(&server.ws_url).await;
    authenticate(&mut client, &server.auth, "collwatcher@example.com").await;

    for (name, age) in [("User 1", 25), ("User 2", 30), ("User 3", 35)] {
        server
            .store
            .add("people", json!({"name": name, "age": age}))
            .await
            .unwrap();
    }

    send_json(
        &mut client,
        json!({
            "type": "watch_collection",
            "requestId": "r2",
            "collection": "people",
            "query": {
                "where": [{"field": "age", "operator": ">", "value": 28}],
                "orderBy": [{"field": "age", "direction": "asc"}],
            },
        }),
    )
    .await;

    let initial = recv_json(&mut client).await;
    assert_eq!(initial["type"], "watch_collection");
    let names: Vec<&str> = initial["change"]["changes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["data"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["User 2", "User 3"]);

    server
        .store
        .add("people", json!({"name": "User 4", "age": 32}))
        .await
        .unwrap();

    let delta = recv_json(&mut client).await;
    let changes = delta["change"]["changes"].as_array().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0]["data"]["name"], "User 4");
    assert_eq!(changes[0]["type"], "added");
}

#[tokio::test]
async fn presence_update_fans_out_to_other_channels_only_and_offline_on_close() {
    let server = spawn_server().await;
    let mut a = connect(&server.ws_url).await;
    let mut b = connect(&server.ws_url).await;
    let a_auth = authenticate(&mut a, &server.auth, "presence-a@example.com").await;
    authenticate(&mut b, &server.auth, "presence-b@example.com").await;

    send_json(
        &mut a,
        json!({
            "type": "presence",
            "requestId": "r2",
            "action": "update",
            "status": "away",
            "metadata": {"location": "meeting"},
        }),
    )
    .await;

    let received = recv_json(&mut b).await;
    assert_eq!(received["type"], "presence");
    assert_eq!(received["userId"], a_auth.user_id);
    assert_eq!(received["status"], "away");
    assert_eq!(received["metadata"]["location"], "meeting");

    // A sent the update and should not see it echoed back to itself.
    let a_sees_nothing =
        tokio::time::timeout(Duration::from_millis(150), recv_json(&mut a)).await;
    assert!(a_sees_nothing.is_err());

    drop(a);
    let offline = recv_json(&mut b).await;
    assert_eq!(offline["type"], "presence");
    assert_eq!(offline["userId"], a_auth.user_id);
    assert_eq!(offline["status"], "offline");
}
