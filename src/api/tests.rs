use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::api::build_router;
use crate::error::Result;
use crate::registry::CapabilityRegistry;
use crate::scraper::{capability_fn, ParameterBag, ScrapeModule};

async fn stalk_echo(params: ParameterBag) -> Result<Value> {
    let msg = params.required_text("msg", "msg is required")?;
    Ok(json!({ "msg": msg }))
}

async fn add_echo(params: ParameterBag) -> Result<Value> {
    Ok(params.into_value())
}

async fn check_panic(_params: ParameterBag) -> Result<Value> {
    panic!("kaboom");
}

fn echo_module() -> ScrapeModule {
    ScrapeModule::new("echo")
        .export(capability_fn("stalkEcho", stalk_echo))
        .export(capability_fn("addEcho", add_echo))
        .export(capability_fn("checkPanic", check_panic))
}

fn app() -> Router {
    let module = echo_module();
    let registry = CapabilityRegistry::from_modules([&module]);
    build_router(Arc::new(registry), 1024)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn with_body(method: Method, uri: &str, content_type: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_missing_parameter_yields_failure_envelope() {
    let (status, body) = send(app(), get("/api/echo/stalkEcho")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "success": false, "creator": "Kuroxel", "error": "msg is required" })
    );
}

#[tokio::test]
async fn test_success_envelope() {
    let (status, body) = send(app(), get("/api/echo/stalkEcho?msg=hi")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "success": true, "creator": "Kuroxel", "data": { "msg": "hi" } })
    );
}

#[tokio::test]
async fn test_body_overrides_query() {
    let request = with_body(
        Method::GET,
        "/api/echo/stalkEcho?msg=fromquery",
        "application/json",
        r#"{"msg":"frombody"}"#,
    );
    let (status, body) = send(app(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["msg"], json!("frombody"));
}

#[tokio::test]
async fn test_form_body_merges_with_query() {
    let request = with_body(
        Method::POST,
        "/api/echo/addEcho?a=0&c=q",
        "application/x-www-form-urlencoded",
        "a=1&b=x%20y",
    );
    let (status, body) = send(app(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "a": "1", "b": "x y", "c": "q" }));
}

#[tokio::test]
async fn test_json_body_keeps_value_types() {
    let request = with_body(
        Method::POST,
        "/api/echo/addEcho?tag=a&tag=b",
        "application/json",
        r#"{"n":5,"flag":true,"nested":{"k":"v"}}"#,
    );
    let (_, body) = send(app(), request).await;

    assert_eq!(
        body["data"],
        json!({ "tag": ["a", "b"], "n": 5, "flag": true, "nested": { "k": "v" } })
    );
}

#[tokio::test]
async fn test_inferred_method_is_enforced() {
    let response = app().oneshot(get("/api/echo/addEcho")).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let request = with_body(Method::POST, "/api/echo/stalkEcho", "application/json", "{}");
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let response = app().oneshot(get("/api/echo/unknown")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_json_body_is_rejected() {
    let request = with_body(Method::POST, "/api/echo/addEcho", "application/json", "{oops");
    let (status, body) = send(app(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["creator"], json!("Kuroxel"));
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
}

#[tokio::test]
async fn test_panicking_capability_yields_failure_envelope() {
    let (status, body) = send(app(), get("/api/echo/checkPanic")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "success": false, "creator": "Kuroxel", "error": "kaboom" })
    );
}

#[tokio::test]
async fn test_api_metadata() {
    let (status, body) = send(app(), get("/api")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["creator"], json!("Kuroxel"));
    assert_eq!(body["message"], json!("Carlotta - Simple & Clean API System"));
    assert_eq!(body["version"], json!(env!("CARGO_PKG_VERSION")));
    assert_eq!(body["features"].as_array().unwrap().len(), 3);
    assert_eq!(body["total"], json!(3));
    assert_eq!(
        body["endpoints"],
        json!([
            { "method": "get", "route": "/api/echo/stalkEcho", "module": "echo", "function": "stalkEcho" },
            { "method": "post", "route": "/api/echo/addEcho", "module": "echo", "function": "addEcho" },
            { "method": "get", "route": "/api/echo/checkPanic", "module": "echo", "function": "checkPanic" },
        ])
    );
}

#[tokio::test]
async fn test_index_lists_routes() {
    let response = app().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("/api/echo/stalkEcho"));
    assert!(html.contains("/api/echo/addEcho"));
    assert!(html.contains(r#"<div class="stats-value">3</div>"#));
}

#[tokio::test]
async fn test_empty_registry_still_serves_fixed_routes() {
    let app = build_router(Arc::new(CapabilityRegistry::default()), 1024);

    let (status, body) = send(app.clone(), get("/api")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], json!(0));
    assert_eq!(body["endpoints"], json!([]));

    let response = app.oneshot(get("/api/echo/stalkEcho")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_headers_are_present() {
    let request = Request::builder()
        .uri("/api")
        .header("origin", "https://example.com")
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}
