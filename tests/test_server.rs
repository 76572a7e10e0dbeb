//! HTTP surface of the ingestion endpoint, exercised without a socket.

#![cfg(feature = "server")]

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use distribution_records::ingest::Ingestor;
use distribution_records::server::router;
use distribution_records::store::MemoryStore;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

fn app() -> (Router, Arc<Mutex<MemoryStore>>) {
    let store = Arc::new(Mutex::new(MemoryStore::new()));
    let ingestor = Ingestor::builder_shared(store.clone())
        .clock(common::FixedClock::tokyo())
        .build();
    (router(ingestor), store)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(body.into())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn post_appends_and_confirms() {
    let (app, store) = app();
    let (status, headers, body) =
        send(&app, post("/", common::legacy_payload().to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Record saved");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    use distribution_records::store::SheetStore;
    let rows = store.lock().unwrap().rows("records").unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn bad_submissions_still_answer_200() {
    let (app, _) = app();

    let (status, _, body) = send(&app, post("/api/records", "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "request body is empty");

    let (status, _, body) = send(&app, post("/api/records", "{oops")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().starts_with("invalid JSON"));
}

#[tokio::test]
async fn actor_header_reaches_activity_log() {
    let (app, store) = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/records")
        .header("x-forwarded-email", "trainer@example.com")
        .body(Body::from(common::legacy_payload().to_string()))
        .unwrap();
    send(&app, request).await;

    use distribution_records::store::SheetStore;
    let rows = store.lock().unwrap().rows("activity_log").unwrap();
    assert_eq!(rows[1][1], "trainer@example.com");
}

#[tokio::test]
async fn options_anywhere_is_empty_200_with_cors() {
    let (app, _) = app();
    for uri in ["/", "/api/records", "/no/such/path"] {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let (status, headers, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body, Value::Null);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(headers.contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
    }
}

#[tokio::test]
async fn root_and_health() {
    let (app, _) = app();
    let (status, _, body) = send(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

    let (_, _, body) = send(&app, get("/health")).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn list_and_get_records() {
    let (app, _) = app();
    for id in ["a", "b", "c"] {
        let payload = serde_json::json!({ "id": id, "name": { "ja": id }, "dexNo": "7" });
        send(&app, post("/api/records", payload.to_string())).await;
    }

    let (status, _, body) = send(&app, get("/api/records?limit=2&offset=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"][0]["ID"], "b");

    let (status, _, body) = send(&app, get("/api/records/c")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["Dex No"], "0007");

    let (status, _, body) = send(&app, get("/api/records/zzz")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn unknown_path_is_404() {
    let (app, _) = app();
    let (status, headers, body) = send(&app, get("/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Not found");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
