//! Integration tests for the backend router.
//!
//! Drives the assembled Axum router directly, covering the device-header
//! requirement, the sealed handshake and bundle endpoints, and dynamic
//! API route execution with status extraction.

#![cfg(feature = "server")]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use pagewright::backend::routes::create_router;
use pagewright::backend::server::state::{AppState, DocumentSet};
use pagewright::shared::cipher::device_secret;
use pagewright::shared::document::{Audience, Component, Middleware, Route};
use pagewright::shared::envelope;
use pagewright::shared::script::new_store;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

const DEVICE_ID: &str = "itest-device";

fn secret() -> String {
    device_secret("localhost", DEVICE_ID)
}

fn sample_documents() -> DocumentSet {
    let routes = vec![
        Route {
            endpoint: "/".into(),
            method: None,
            audience: Audience::FE,
            middlewares: vec![],
            view: json!({"title": "Home", "render": {"element": "div"}}),
        },
        Route {
            endpoint: "/api/items/:id".into(),
            method: Some("GET".into()),
            audience: Audience::BE,
            middlewares: vec!["count".into()],
            view: json!(r#"{"id": ["var", "params.id"], "hits": ["store.get", "hits"]}"#),
        },
        Route {
            endpoint: "/api/items".into(),
            method: Some("POST".into()),
            audience: Audience::BE,
            middlewares: vec![],
            view: json!(r#"{"statusCode": 201, "ok": true, "name": ["var", "req.body.name"]}"#),
        },
    ];
    let middlewares = vec![Middleware {
        key: "count".into(),
        audience: Audience::BE,
        script: r#"["store.merge", {"hits": 1}]"#.into(),
        order: 1,
    }];
    let components = vec![Component {
        key: "card".into(),
        view: json!({"title": "card", "render": {"element": "section"}}),
    }];
    DocumentSet::new("1.0.0".into(), middlewares, routes, components)
}

fn app() -> axum::Router {
    let state = AppState {
        documents: Arc::new(sample_documents()),
        store: new_store(),
        db_pool: None,
        env: Arc::new(serde_json::Map::new()),
    };
    create_router(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn open_body_json(response: axum::response::Response) -> Value {
    let sealed = body_json(response).await;
    assert!(envelope::is_sealed(&sealed), "expected sealed body");
    envelope::open(&secret(), &sealed).unwrap()
}

fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("host", "localhost")
        .header("x-device-id", DEVICE_ID)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn missing_device_header_is_not_acceptable() {
    let response = app()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/ping")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn static_path_is_exempt_from_device_header() {
    let response = app()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/static/missing.css")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    // ServeDir answers; the identity middleware stays out of the way.
    assert_ne!(response.status(), StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn ping_reports_version_sealed() {
    let response = app().oneshot(request("GET", "/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let payload = open_body_json(response).await;
    assert_eq!(payload["version"], json!("1.0.0"));
    assert_eq!(payload["status"], json!("ok"));
}

#[tokio::test]
async fn init_serves_frontend_bundle_only() {
    let response = app().oneshot(request("GET", "/init")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bundle = open_body_json(response).await;
    assert_eq!(bundle["version"], json!("1.0.0"));

    let routes = bundle["routes"].as_array().unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0]["endpoint"], json!("/"));
    assert!(routes[0].get("for").is_none());

    // Backend middlewares stay on the server.
    assert_eq!(bundle["middlewares"].as_array().unwrap().len(), 0);
    assert_eq!(bundle["components"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn dynamic_route_runs_with_params_and_middlewares() {
    let response = app()
        .oneshot(request("GET", "/api/items/42"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let payload = open_body_json(response).await;
    assert_eq!(payload["id"], json!("42"));
    // The `count` middleware merged into the store before the script ran.
    assert_eq!(payload["hits"], json!(1));
}

#[tokio::test]
async fn dynamic_route_extracts_status_code() {
    let body = envelope::seal(&secret(), &json!({"name": "widget"})).unwrap();
    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/items")
                .header("host", "localhost")
                .header("x-device-id", DEVICE_ID)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let payload = open_body_json(response).await;
    assert_eq!(payload, json!({"ok": true, "name": "widget"}));
}

#[tokio::test]
async fn plaintext_post_body_is_rejected() {
    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/items")
                .header("host", "localhost")
                .header("x-device-id", DEVICE_ID)
                .header("content-type", "application/json")
                .body(Body::from(json!({"name": "widget"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_api_route_is_not_found() {
    let response = app()
        .oneshot(request("GET", "/api/nothing/here"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let payload = open_body_json(response).await;
    assert_eq!(payload, json!({"message": "endpoint not found"}));
}

#[tokio::test]
async fn method_filter_applies_to_dynamic_routes() {
    let response = app()
        .oneshot(request("DELETE", "/api/items/42"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
