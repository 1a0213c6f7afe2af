//! HTTP 接口测试
//!
//! 通过 `oneshot` 直接驱动 Router，覆盖成功响应与各类错误映射。

use std::collections::HashMap;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use rule_builder_service::{AppState, handlers::CONTEXT_KEY_HEADER, routes};
use rule_builder_shared::config::{AppConfig, ContextConfig};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> Router {
    routes::app(AppState::default())
}

fn post(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/process-rules")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_process_rules_success() {
    let payload = json!({
        "condition": "AND",
        "rules": [
            {"field": "age", "operator": "greater", "value": 18},
            {"field": "name", "operator": "equal", "value": "John Doe"}
        ]
    });

    let (status, body) = send(app(), post(payload.to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!(true));
    assert_eq!(body["expression"], json!(r#"age > "18" && name == "John Doe""#));
    assert_eq!(
        body["context"],
        json!({"name": "John Doe", "age": 30, "birthday": "1990-01-01"})
    );
}

#[tokio::test]
async fn test_process_rules_false_result() {
    let payload = json!({
        "condition": "OR",
        "rules": [
            {"field": "name", "operator": "ends_with", "value": "Smith"},
            {"field": "birthday", "operator": "less", "value": "1980-01-01"}
        ]
    });

    let (status, body) = send(app(), post(payload.to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!(false));
    assert_eq!(
        body["expression"],
        json!(r#"str_ends_with(name, "Smith") || birthday < "1980-01-01""#)
    );
}

#[tokio::test]
async fn test_wide_flat_group() {
    let leaves: Vec<Value> = (0..20_000)
        .map(|_| json!({"field": "age", "operator": "greater", "value": 1}))
        .collect();
    let payload = json!({"condition": "AND", "rules": leaves});

    let (status, body) = send(app(), post(payload.to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!(true));
    let expression = body["expression"].as_str().unwrap();
    assert_eq!(expression.matches(" && ").count(), 19_999);
}

#[tokio::test]
async fn test_invalid_json_body() {
    let (status, body) = send(app(), post("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("INVALID_JSON"));
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["data"], Value::Null);

    let (status, body) = send(app(), post("[1, 2]")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("INVALID_JSON"));
}

#[tokio::test]
async fn test_missing_rules_key() {
    let (status, body) = send(app(), post(json!({"condition": "AND"}).to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("INVALID_PAYLOAD"));
    assert_eq!(body["message"], json!("Invalid rules payload."));

    let (status, body) = send(app(), post(json!({"condition": "AND", "rules": null}).to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("INVALID_PAYLOAD"));
}

#[tokio::test]
async fn test_malformed_group() {
    let payload = json!({
        "condition": "XOR",
        "rules": [{"field": "age", "operator": "equal", "value": 1}]
    });
    let (status, body) = send(app(), post(payload.to_string())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], json!("MALFORMED_RULE"));
}

#[tokio::test]
async fn test_unknown_field_fails_evaluation() {
    let payload = json!({
        "condition": "AND",
        "rules": [{"field": "height", "operator": "greater", "value": 180}]
    });
    let (status, body) = send(app(), post(payload.to_string())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], json!("EVALUATION_FAILED"));
}

#[tokio::test]
async fn test_keyed_context_selection() {
    let jane = json!({"name": "Jane Roe", "age": 41, "birthday": "1983-05-06"})
        .as_object()
        .cloned()
        .unwrap();
    let config = AppConfig {
        context: ContextConfig {
            default: None,
            subjects: HashMap::from([("jane".to_string(), jane)]),
            fallback: false,
        },
        ..Default::default()
    };
    let app = routes::app(AppState::from_config(&config));

    let payload = json!({
        "condition": "AND",
        "rules": [{"field": "age", "operator": "greater", "value": 40}]
    })
    .to_string();

    let mut request = post(payload.clone());
    request
        .headers_mut()
        .insert(CONTEXT_KEY_HEADER, "jane".parse().unwrap());
    let (status, body) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!(true));
    assert_eq!(body["context"]["name"], json!("Jane Roe"));

    let (status, body) = send(app, post(payload)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!("CONTEXT_NOT_FOUND"));
}

#[tokio::test]
async fn test_typed_literals_config() {
    let mut config = AppConfig::default();
    config.compiler.typed_literals = true;
    let app = routes::app(AppState::from_config(&config));

    let payload = json!({
        "condition": "AND",
        "rules": [{"field": "name", "operator": "in", "value": ["Jane", "John Doe"]}]
    });
    let (status, body) = send(app, post(payload.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expression"], json!(r#"name in ["Jane", "John Doe"]"#));
    assert_eq!(body["result"], json!(true));
}

#[tokio::test]
async fn test_request_id_header() {
    let payload = json!({"condition": "AND", "rules": [{"field": "age", "operator": "is_not_null", "value": null}]});
    let response = app().oneshot(post(payload.to_string())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}
