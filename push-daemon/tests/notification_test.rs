mod common;

use common::TestApp;
use futures::future::join_all;
use push_daemon::services::{FailAt, MockPushProvider};
use reqwest::{Client, StatusCode};
use serde_json::json;
use service_core::observability::init_metrics;
use std::sync::Arc;

// =============================================================================
// Health Check
// =============================================================================

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn(Arc::new(MockPushProvider::new())).await;

    let response = Client::new()
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "push-daemon");
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = TestApp::spawn(Arc::new(MockPushProvider::new())).await;

    let response = Client::new()
        .get(format!("{}/health", app.address))
        .header("x-request-id", "trace-me")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.headers()["x-request-id"], "trace-me");
}

#[tokio::test]
async fn metrics_count_every_provider_stage() {
    init_metrics();
    let app = TestApp::spawn(Arc::new(MockPushProvider::new())).await;

    let response = app
        .send(&json!({"title": "Hi", "body": "There", "device_tokens": ["tok-123"]}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = Client::new()
        .get(format!("{}/metrics", app.address))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.text().await.unwrap();
    for stage in ["initialize", "messaging", "send"] {
        let series = format!(r#"push_provider_calls_total{{stage="{stage}",status="ok"}}"#);
        assert!(body.contains(&series), "missing {series} in:\n{body}");
    }
    assert!(body.contains(r#"push_notifications_sent_total{provider="mock"}"#));
}

// =============================================================================
// Dispatch
// =============================================================================

#[tokio::test]
async fn sends_one_message_to_first_device_token() {
    let provider = MockPushProvider::new();
    let app = TestApp::spawn(Arc::new(provider.clone())).await;

    let response = app
        .send(&json!({
            "title": "Hi",
            "body": "There",
            "device_tokens": ["tok-123", "tok-456"]
        }))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.text().await.unwrap(),
        "Successfully sent message to device: projects/mock/messages/1"
    );

    let sent = provider.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].token, "tok-123");
    assert_eq!(sent[0].title, "Hi");
    assert_eq!(sent[0].body, "There");
}

#[tokio::test]
async fn accepts_body_without_json_content_type() {
    let provider = MockPushProvider::new();
    let app = TestApp::spawn(Arc::new(provider.clone())).await;

    let response = Client::new()
        .post(format!("{}/send_notifications", app.address))
        .body(r#"{"title":"Hi","body":"There","device_tokens":["tok-123"]}"#)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(provider.send_count(), 1);
}

#[tokio::test]
async fn malformed_json_is_rejected_without_provider_call() {
    let provider = MockPushProvider::new();
    let app = TestApp::spawn(Arc::new(provider.clone())).await;

    for body in ["{not json", "", r#"{"device_tokens": "tok-123"}"#, "[1,2,3]"] {
        let response = app.send_raw(body).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body:?}");
        assert_eq!(response.text().await.unwrap(), "Invalid request");
    }

    assert_eq!(provider.send_count(), 0);
}

#[tokio::test]
async fn empty_device_tokens_is_a_bad_request() {
    let provider = MockPushProvider::new();
    let app = TestApp::spawn(Arc::new(provider.clone())).await;

    let response = app
        .send(&json!({"title": "Hi", "body": "There", "device_tokens": []}))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.text().await.unwrap(), "Invalid request");
    assert_eq!(provider.send_count(), 0);
}

#[tokio::test]
async fn provider_initialization_failure_is_500() {
    let app = TestApp::spawn(Arc::new(MockPushProvider::failing_at(FailAt::Initialize))).await;

    let response = app
        .send(&json!({"title": "Hi", "body": "There", "device_tokens": ["tok-123"]}))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.text().await.unwrap(),
        "Firebase initialization failed"
    );
}

#[tokio::test]
async fn messaging_client_failure_stops_the_request() {
    let provider = MockPushProvider::failing_at(FailAt::Messaging);
    let app = TestApp::spawn(Arc::new(provider.clone())).await;

    let response = app
        .send(&json!({"title": "Hi", "body": "There", "device_tokens": ["tok-123"]}))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text().await.unwrap(), "FCM Client init failed");
    assert_eq!(provider.send_count(), 0);
}

#[tokio::test]
async fn send_failure_is_500() {
    let app = TestApp::spawn(Arc::new(MockPushProvider::failing_at(FailAt::Send))).await;

    let response = app
        .send(&json!({"title": "Hi", "body": "There", "device_tokens": ["tok-123"]}))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text().await.unwrap(), "Failed to send FCM message");
}

#[tokio::test]
async fn get_is_not_routed_to_dispatch() {
    let app = TestApp::spawn(Arc::new(MockPushProvider::new())).await;

    let response = Client::new()
        .get(format!("{}/send_notifications", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

// =============================================================================
// Concurrency & lifecycle
// =============================================================================

#[tokio::test]
async fn concurrent_requests_are_independent() {
    let provider = MockPushProvider::new();
    let app = TestApp::spawn(Arc::new(provider.clone())).await;

    let requests = (0..16).map(|i| {
        let payload = json!({
            "title": format!("title-{i}"),
            "body": format!("body-{i}"),
            "device_tokens": [format!("tok-{i}")]
        });
        let app = &app;
        async move { app.send(&payload).await.status() }
    });

    let statuses = join_all(requests).await;
    assert!(statuses.iter().all(|s| *s == StatusCode::OK));

    let mut tokens: Vec<String> = provider.sent().into_iter().map(|m| m.token).collect();
    tokens.sort();
    let mut expected: Vec<String> = (0..16).map(|i| format!("tok-{i}")).collect();
    expected.sort();
    assert_eq!(tokens, expected);

    for message in provider.sent() {
        let suffix = message.token.trim_start_matches("tok-");
        assert_eq!(message.title, format!("title-{suffix}"));
        assert_eq!(message.body, format!("body-{suffix}"));
    }
}

#[tokio::test]
async fn shutdown_handle_stops_the_server() {
    let app = TestApp::spawn(Arc::new(MockPushProvider::new())).await;

    app.shutdown.cancel();
    let result = tokio::time::timeout(std::time::Duration::from_secs(5), app.server)
        .await
        .expect("server did not stop")
        .expect("server task panicked");
    assert!(result.is_ok());

    let connect = Client::new()
        .get(format!("{}/health", app.address))
        .send()
        .await;
    assert!(connect.is_err());
}
