//! HTTP routes served without a database behind them

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use mongo_gateway::api::{server::create_app, state::ApiState};
use mongo_gateway::global::config::{AppConfig, AppSettings, DatabaseConfig};

fn state_without_database() -> ApiState {
    let config = AppConfig {
        app: AppSettings::default(),
        database: DatabaseConfig::default(),
    };
    ApiState::new(Arc::new(config))
}

async fn send(method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let app = create_app(state_without_database());

    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_reports_disabled_database() {
    let (status, body) = send(Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["database"]["enabled"], false);
    assert!(body["database"]["reachable"].is_null());
}

#[tokio::test]
async fn document_routes_unavailable_without_database() {
    let requests = [
        (Method::POST, "/api/documents", json!({ "name": "widget" })),
        (Method::POST, "/api/documents/find", json!({ "filter": {} })),
        (Method::POST, "/api/documents/update", json!({ "filter": {}, "update": { "$set": { "x": 1 } } })),
        (Method::POST, "/api/documents/delete", json!({ "filter": {} })),
    ];

    for (method, uri, body) in requests {
        let (status, response) = send(method, uri, Some(body)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{}", uri);
        assert_eq!(response["error"], "MongoDB is not enabled");
    }

    let (status, _) = send(Method::GET, "/api/documents/count", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn empty_batch_is_rejected_before_touching_database() {
    let (status, body) = send(Method::POST, "/api/documents/batch", Some(json!({ "documents": [] }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No documents provided");
}

#[tokio::test]
async fn malformed_json_body_is_client_error() {
    let app = create_app(state_without_database());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/documents/find")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (status, _) = send(Method::GET, "/api/unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
