//! Inference server router driven end to end against a mock model server

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use mockito::{Matcher, Server};
use resilio_backend::inference::server::{router, InferenceState};
use resilio_backend::inference::CompletionsGenerator;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn create_app(model_endpoint: &str) -> Router {
    let generator =
        CompletionsGenerator::new(model_endpoint, "counselor", Duration::from_secs(5)).unwrap();
    router(Arc::new(InferenceState::new(Arc::new(generator))))
}

async fn call(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_conversation_round_trip() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/v1/models")
        .with_status(200)
        .with_body(r#"{"data": [{"id": "counselor"}]}"#)
        .expect_at_least(1)
        .create_async()
        .await;
    let completion = server
        .mock("POST", "/v1/completions")
        .match_body(Matcher::PartialJson(json!({
            "prompt": "[INST] Hi [/INST] Hello. [INST] I feel low [/INST]",
            "temperature": 0.5
        })))
        .with_status(200)
        .with_body(r#"{"choices": [{"text": " I'm sorry you feel that way. "}]}"#)
        .create_async()
        .await;

    let (status, body) = call(
        create_app(&server.url()),
        Method::POST,
        "/chat/conversation",
        Some(json!({
            "message": "I feel low",
            "temperature": 0.5,
            "history": [
                {"role": "user", "content": "Hi"},
                {"role": "assistant", "content": "Hello."}
            ]
        })),
    )
    .await;

    completion.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "I'm sorry you feel that way.");
    assert_eq!(body["model_info"]["base"], "mistralai/Mistral-7B-Instruct-v0.3");
}

#[tokio::test]
async fn test_model_server_down() {
    let app = create_app("http://127.0.0.1:9");

    let (status, body) = call(app.clone(), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unhealthy");

    let (status, body) = call(app, Method::POST, "/chat", Some(json!({"message": "Hi"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["detail"], "Model not loaded");
}

/// Model server mock whose listing endpoint reports the model as loaded
async fn ready_model_server() -> mockito::ServerGuard {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/v1/models")
        .with_status(200)
        .with_body(r#"{"data": [{"id": "counselor"}]}"#)
        .create_async()
        .await;
    server
}

#[tokio::test]
async fn test_validation_errors() {
    let server = ready_model_server().await;
    let app = create_app(&server.url());

    let (status, body) = call(app.clone(), Method::POST, "/chat", Some(json!({"message": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Message is required");

    let (status, _) = call(
        app.clone(),
        Method::POST,
        "/chat",
        Some(json!({"message": "Hi", "max_length": 4096})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        app,
        Method::POST,
        "/chat/conversation",
        Some(json!({"message": "Hi", "history": "not a list"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_not_loaded_answers_before_validation() {
    let app = create_app("http://127.0.0.1:9");
    let (status, body) = call(app, Method::POST, "/chat", Some(json!({"message": ""}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["detail"], "Model not loaded");
}

#[tokio::test]
async fn test_model_listing_checked_once() {
    let mut server = Server::new_async().await;
    let models = server
        .mock("GET", "/v1/models")
        .with_status(200)
        .with_body(r#"{"data": [{"id": "counselor"}]}"#)
        .expect(1)
        .create_async()
        .await;
    server
        .mock("POST", "/v1/completions")
        .with_status(200)
        .with_body(r#"{"choices": [{"text": "Breathe."}]}"#)
        .expect(2)
        .create_async()
        .await;

    let app = create_app(&server.url());
    for _ in 0..2 {
        let (status, body) = call(app.clone(), Method::POST, "/chat", Some(json!({"message": "Hi"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "Breathe.");
    }
    models.assert_async().await;
}
