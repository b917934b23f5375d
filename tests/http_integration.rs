//! End-to-end exercises of the Request Surface against the in-memory store: HTTP in,
//! JSON envelope out. No external services required, unlike the teacher's `tests/`
//! directory (whose integration suite needs a live Firebase project) — this store
//! adapter is self-contained, so these run in any `cargo test` invocation.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use phoenixstore::auth::{AuthCore, AuthSettings, JwtSecret};
use phoenixstore::blob::BlobStore;
use phoenixstore::http::{router, AppState};
use phoenixstore::multiplexer::{Multiplexer, MultiplexerSettings};
use phoenixstore::store::memory::MemoryStore;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_app() -> axum::Router {
    let store = Arc::new(MemoryStore::new());
    let auth = Arc::new(AuthCore::new(
        store.clone(),
        JwtSecret::new("integration-test-secret"),
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
    router(AppState {
        store,
        auth,
        blobs,
        multiplexer,
    })
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn register_then_login_issues_tokens() {
    let app = test_app();

    let register = json_request(
        "POST",
        "/api/v1/auth/register",
        json!({"email": "Ada@Example.com", "password": "Str0ng!Pass"}),
    );
    let response = app.clone().oneshot(register).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["email"], "ada@example.com");

    let login = json_request(
        "POST",
        "/api/v1/auth/login",
        json!({"email": "ada@example.com", "password": "Str0ng!Pass"}),
    );
    let response = app.oneshot(login).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert!(!body["accessToken"].as_str().unwrap().is_empty());
    assert!(!body["refreshToken"].as_str().unwrap().is_empty());
    assert_eq!(body["expiresIn"], 15 * 60 * 1000);
}

#[tokio::test]
async fn register_rejects_weak_password() {
    let app = test_app();
    let register = json_request(
        "POST",
        "/api/v1/auth/register",
        json!({"email": "bob@example.com", "password": "weak"}),
    );
    let body = body_json(app.oneshot(register).await.unwrap()).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], "INVALID_PASSWORD");
}

#[tokio::test]
async fn document_crud_round_trips() {
    let app = test_app();

    let create = json_request("POST", "/api/v1/people", json!({"name": "Ada", "age": 30}));
    let created = body_json(app.clone().oneshot(create).await.unwrap()).await;
    assert_eq!(created["status"], "success");
    let id = created["id"].as_str().unwrap().to_string();

    let get = get_request(&format!("/api/v1/people/{id}"));
    let fetched = body_json(app.clone().oneshot(get).await.unwrap()).await;
    assert_eq!(fetched["data"]["name"], "Ada");

    let update = json_request("PUT", &format!("/api/v1/people/{id}"), json!({"age": 31}));
    let updated = body_json(app.clone().oneshot(update).await.unwrap()).await;
    assert_eq!(updated["status"], "success");

    let get_again = get_request(&format!("/api/v1/people/{id}"));
    let refetched = body_json(app.clone().oneshot(get_again).await.unwrap()).await;
    assert_eq!(refetched["data"]["age"], 31);
    assert_eq!(refetched["data"]["name"], "Ada");

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/api/v1/people/{id}"))
        .body(Body::empty())
        .unwrap();
    let deleted = body_json(app.clone().oneshot(delete).await.unwrap()).await;
    assert_eq!(deleted["status"], "success");

    let get_missing = get_request(&format!("/api/v1/people/{id}"));
    let missing = body_json(app.oneshot(get_missing).await.unwrap()).await;
    assert_eq!(missing["code"], "DOCUMENT_NOT_FOUND");
}

#[tokio::test]
async fn magic_latest_segment_is_never_a_real_document() {
    let app = test_app();
    let get = get_request("/api/v1/people/latest");
    let body = body_json(app.oneshot(get).await.unwrap()).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], "DOCUMENT_NOT_FOUND");
}

/// Mirrors the chained where + orderBy + limit scenario: five people, filter by age and
/// an array-contains tag, sort descending, cap at two results.
#[tokio::test]
async fn chained_where_order_limit_scenario() {
    let app = test_app();
    for (name, age, city, tags) in [
        ("John", 25, "NY", json!(["developer"])),
        ("Jane", 30, "London", json!(["designer"])),
        ("Bob", 20, "Paris", json!(["developer", "designer"])),
        ("Alice", 35, "NY", json!(["manager"])),
        ("Charlie", 28, "London", json!(["developer"])),
    ] {
        let create = json_request(
            "POST",
            "/api/v1/people",
            json!({"name": name, "age": age, "city": city, "tags": tags}),
        );
        app.clone().oneshot(create).await.unwrap();
    }

    let query_string = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("where", "age:>=:25")
        .append_pair("where", "tags:array-contains:developer")
        .append_pair("orderBy", "age:desc")
        .append_pair("limit", "2")
        .finish();
    let response = app
        .oneshot(get_request(&format!("/api/v1/people?{query_string}")))
        .await
        .unwrap();
    let body = body_json(response).await;
    let names: Vec<&str> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["data"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Charlie", "John"]);
}

#[tokio::test]
async fn repeated_bad_logins_lock_the_account_over_http() {
    let app = test_app();
    let register = json_request(
        "POST",
        "/api/v1/auth/register",
        json!({"email": "locked@example.com", "password": "Str0ng!Pass"}),
    );
    app.clone().oneshot(register).await.unwrap();

    for _ in 0..4 {
        let login = json_request(
            "POST",
            "/api/v1/auth/login",
            json!({"email": "locked@example.com", "password": "wrong"}),
        );
        let body = body_json(app.clone().oneshot(login).await.unwrap()).await;
        assert_eq!(body["code"], "INVALID_PASSWORD");
    }

    let login = json_request(
        "POST",
        "/api/v1/auth/login",
        json!({"email": "locked@example.com", "password": "wrong"}),
    );
    let body = body_json(app.clone().oneshot(login).await.unwrap()).await;
    assert_eq!(body["code"], "ACCOUNT_LOCKED");

    let login_correct = json_request(
        "POST",
        "/api/v1/auth/login",
        json!({"email": "locked@example.com", "password": "Str0ng!Pass"}),
    );
    let body = body_json(app.oneshot(login_correct).await.unwrap()).await;
    assert_eq!(body["code"], "ACCOUNT_LOCKED");
}

#[tokio::test]
async fn blob_put_get_delete_round_trips() {
    let app = test_app();
    let put = Request::builder()
        .method("PUT")
        .uri("/api/v1/blobs/avatars/ada.png")
        .header("content-type", "image/png")
        .body(Body::from(vec![1u8, 2, 3, 4]))
        .unwrap();
    let body = body_json(app.clone().oneshot(put).await.unwrap()).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["size"], 4);
    assert_eq!(body["contentType"], "image/png");

    let get = get_request("/api/v1/blobs/avatars/ada.png");
    let response = app.clone().oneshot(get).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), &[1, 2, 3, 4]);

    let delete = Request::builder()
        .method("DELETE")
        .uri("/api/v1/blobs/avatars/ada.png")
        .body(Body::empty())
        .unwrap();
    let body = body_json(app.clone().oneshot(delete).await.unwrap()).await;
    assert_eq!(body["status"], "success");

    let get_missing = get_request("/api/v1/blobs/avatars/ada.png");
    let body = body_json(app.oneshot(get_missing).await.unwrap()).await;
    assert_eq!(body["code"], "DOCUMENT_NOT_FOUND");
}
