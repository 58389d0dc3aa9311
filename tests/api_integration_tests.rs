//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use club_cache::api::create_router;
use club_cache::cache::{Backend, CacheManager, CacheOptions, Namespace};
use club_cache::clock::ManualClock;
use club_cache::rate_limit::{RateLimitPolicy, RateLimiter};
use club_cache::store::{KvStore, MemoryKvStore};
use club_cache::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

// == Helper Functions ==

fn test_state() -> (AppState, ManualClock) {
    let clock = ManualClock::default();
    (AppState::local(Arc::new(clock.clone())), clock)
}

fn create_test_app() -> Router {
    create_router(test_state().0)
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn put_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// == Cache Entry Endpoints ==

#[tokio::test]
async fn test_set_then_get() {
    let app = create_test_app();

    let response = app
        .clone()
        .oneshot(put_json(
            "/cache/event/detail:1",
            json!({"value": {"title": "Spring Gala", "capacity": 120}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["ttl"], 300);
    assert!(json["message"].as_str().unwrap().contains("detail:1"));

    let response = app.oneshot(empty("GET", "/cache/event/detail:1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["namespace"], "event");
    assert_eq!(json["value"]["capacity"], 120);
}

#[tokio::test]
async fn test_set_with_ttl_expires() {
    let (state, clock) = test_state();
    let app = create_router(state);

    let response = app
        .clone()
        .oneshot(put_json("/cache/api/upcoming", json!({"value": [1, 2], "ttl": 30})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    clock.advance(Duration::from_secs(30));
    let response = app.oneshot(empty("GET", "/cache/api/upcoming")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_missing_key_not_found() {
    let response = create_test_app()
        .oneshot(empty("GET", "/cache/user/profile:404"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("profile:404"));
}

#[tokio::test]
async fn test_unknown_namespace_not_found() {
    let response = create_test_app()
        .oneshot(put_json("/cache/orders/1", json!({"value": 1})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_set_invalid_body_rejected() {
    let response = create_test_app()
        .oneshot(put_json("/cache/event/detail:1", json!({"ttl": 10})))
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_oversized_key_rejected() {
    let uri = format!("/cache/event/{}", "k".repeat(300));
    let response = create_test_app().oneshot(empty("GET", &uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_delete_endpoint() {
    let app = create_test_app();
    app.clone()
        .oneshot(put_json("/cache/image/item:1", json!({"value": "meta"})))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(empty("DELETE", "/cache/image/item:1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_json(response.into_body()).await["deleted"], true);

    let response = app
        .oneshot(empty("DELETE", "/cache/image/item:1"))
        .await
        .unwrap();
    assert_eq!(body_to_json(response.into_body()).await["deleted"], false);
}

#[tokio::test]
async fn test_clear_namespace_endpoint() {
    let (state, _) = test_state();
    let events = state.caches.namespace(&Namespace::EVENT);
    let users = state.caches.namespace(&Namespace::USER);
    events.set("a", &1, None).await;
    events.set("b", &2, None).await;
    users.set("a", &3, None).await;

    let response = create_router(state)
        .oneshot(empty("DELETE", "/cache/event"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_json(response.into_body()).await["removed"], 2);
    assert_eq!(users.get::<i32>("a").await, Some(3));
}

// == Stats and Health ==

#[tokio::test]
async fn test_stats_endpoint() {
    let app = create_test_app();
    app.clone()
        .oneshot(put_json("/cache/video/item:1", json!({"value": "clip"})))
        .await
        .unwrap();
    app.clone()
        .oneshot(empty("GET", "/cache/video/item:1"))
        .await
        .unwrap();
    app.clone()
        .oneshot(empty("GET", "/cache/video/item:2"))
        .await
        .unwrap();

    let response = app.oneshot(empty("GET", "/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["backend"], "local");
    assert_eq!(json["disabled"], false);
    let video = json["namespaces"]
        .as_array()
        .unwrap()
        .iter()
        .find(|ns| ns["name"] == "video")
        .unwrap();
    assert_eq!(video["size"], 1);
    assert_eq!(video["hits"], 1);
    assert_eq!(video["misses"], 1);
    assert_eq!(video["hit_rate"], 0.5);
}

#[tokio::test]
async fn test_stats_reports_remote_backend() {
    let clock = ManualClock::default();
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new(Arc::new(clock.clone())));
    let options = CacheOptions {
        clock: Arc::new(clock.clone()),
        ..CacheOptions::default()
    };
    let caches = Arc::new(CacheManager::new(
        Backend::select(Some(store.clone()), options.clock.clone()),
        options,
    ));
    let limiter = Arc::new(RateLimiter::new(Some(store), "club", Arc::new(clock)));

    let response = create_router(AppState::new(caches, limiter))
        .oneshot(empty("GET", "/stats"))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["backend"], "remote");
    assert_eq!(json["rate_limit_backend"], "remote");
}

#[tokio::test]
async fn test_health_endpoint() {
    let response = create_test_app()
        .oneshot(empty("GET", "/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}

// == Invalidation ==

#[tokio::test]
async fn test_invalidate_event_endpoint() {
    let (state, _) = test_state();
    let events = state.caches.namespace(&Namespace::EVENT);
    events.set("detail:5", "gala", None).await;
    events.set("list:all", &[5], None).await;
    events.set("detail:6", "picnic", None).await;

    let response = create_router(state)
        .oneshot(empty("POST", "/invalidate/events/5"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["entity"], "event");
    assert_eq!(json["removed"], 2);
    assert_eq!(json["failed"], 0);
    assert!(events.has("detail:6").await);
}

#[tokio::test]
async fn test_invalidate_user_endpoint() {
    let (state, _) = test_state();
    let users = state.caches.namespace(&Namespace::USER);
    users.set("profile:u1", "Ada", None).await;

    let response = create_router(state)
        .oneshot(empty("POST", "/invalidate/users/u1"))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], 1);
    assert!(!users.has("profile:u1").await);
}

// == Rate Limiting ==

#[tokio::test]
async fn test_rate_limit_denies_with_headers() {
    let (state, clock) = test_state();
    let policy = RateLimitPolicy::new("api", Duration::from_secs(60), 2).unwrap();
    let app = create_router(state.with_api_policy(policy));

    let request = || {
        Request::builder()
            .uri("/stats")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .unwrap()
    };

    for expected_remaining in ["1", "0"] {
        let response = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "2");
        assert_eq!(response.headers()["x-ratelimit-remaining"], expected_remaining);
    }

    clock.advance(Duration::from_secs(15));
    let response = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["retry-after"], "45");
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["policy"], "api");
    assert_eq!(json["retry_after"], 45);

    // Another client is unaffected
    let response = app
        .oneshot(
            Request::builder()
                .uri("/stats")
                .header("x-forwarded-for", "203.0.113.10")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// == Live Server ==

#[tokio::test]
async fn test_live_server_roundtrip() {
    let (state, _) = test_state();
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::new();
    let base = format!("http://{addr}");

    let response = client
        .put(format!("{base}/cache/document/item:7"))
        .json(&json!({"value": {"name": "bylaws.pdf"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response.headers().contains_key("x-ratelimit-remaining"));

    let body: Value = client
        .get(format!("{base}/cache/document/item:7"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["value"]["name"], "bylaws.pdf");

    server.abort();
}
