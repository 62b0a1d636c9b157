//! The full router against a throwaway upstream on localhost.

use axum::{
    Router,
    body::Body,
    extract::{RawQuery, Request},
    http::{StatusCode, header},
    response::Redirect,
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceExt;

use gatekeeper::clock::SystemClock;
use gatekeeper::config::RateLimitConfig;
use gatekeeper::gatekeeper::HEADER_REMAINING;
use gatekeeper::handlers::MAX_BODY_BYTES;
use gatekeeper::models::HealthResponse;
use gatekeeper::routes::router;
use gatekeeper::state::AppState;
use gatekeeper::{Gatekeeper, InMemoryStore};

const BROWSER: &str = "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/121.0";

async fn spawn_upstream() -> String {
    let app = Router::new()
        .route(
            "/api/news",
            get(|RawQuery(query): RawQuery| async move {
                ([("x-upstream", "news")], query.unwrap_or_default())
            }),
        )
        .route("/echo", post(|body: String| async move { body }))
        .route("/old", get(|| async { Redirect::temporary("/new") }))
        .route("/new", get(|| async { "followed" }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn app(upstream: String) -> Router {
    let gate = Gatekeeper::new(
        Arc::new(InMemoryStore::new()),
        RateLimitConfig::default(),
        Arc::new(SystemClock),
    );
    router(Arc::new(AppState::new(upstream, Arc::new(gate)).unwrap()))
}

async fn text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn forwards_path_query_and_body() {
    let app = app(spawn_upstream().await);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/news?topic=tech&page=2")
                .header(header::USER_AGENT, BROWSER)
                .header("x-forwarded-for", "203.0.113.50")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-upstream"], "news");
    assert_eq!(response.headers()[HEADER_REMAINING], "29");
    assert_eq!(text(response).await, "topic=tech&page=2");

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/echo")
                .header(header::USER_AGENT, BROWSER)
                .header("x-forwarded-for", "203.0.113.50")
                .body(Body::from("hello upstream"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[HEADER_REMAINING], "28");
    assert_eq!(text(response).await, "hello upstream");
}

#[tokio::test]
async fn rejected_agents_never_reach_upstream() {
    // nothing listens here, so a forwarded request would turn into a 502
    let app = app("http://127.0.0.1:1".to_string());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/news")
                .header(header::USER_AGENT, "Mozilla/5.0 (compatible; bingbot/2.0)")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn dead_upstream_is_bad_gateway() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let response = app(format!("http://{}", addr))
        .oneshot(
            Request::builder()
                .uri("/")
                .header(header::USER_AGENT, BROWSER)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn ops_endpoints_are_not_gated() {
    let app = app("http://127.0.0.1:1".to_string());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(header::USER_AGENT, "curl/8.4.0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let health: HealthResponse = serde_json::from_str(&text(response).await).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.tracked_clients, 0);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .header(header::USER_AGENT, "Prometheus/2.48.0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("gatekeeper_"));
}

#[tokio::test]
async fn upstream_redirects_reach_the_client() {
    let app = app(spawn_upstream().await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/old")
                .header(header::USER_AGENT, BROWSER)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "/new");
    assert_eq!(response.headers()[HEADER_REMAINING], "29");
    assert_ne!(text(response).await, "followed");
}

#[tokio::test]
async fn oversized_body_is_payload_too_large() {
    let app = app(spawn_upstream().await);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/echo")
                .header(header::USER_AGENT, BROWSER)
                .body(Body::from(vec![b'x'; MAX_BODY_BYTES + 1]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
