//! Home page, health checks and request ids.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use picmaker_integration_tests::TestApp;

#[tokio::test]
async fn test_home_page() {
    let app = TestApp::new().await;

    let response = app.get("/").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(&response.body[..], b"<h1>Pic Profile Maker</h1>");
}

#[tokio::test]
async fn test_liveness() {
    let app = TestApp::new().await;

    let response = app.get("/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(&response.body[..], b"ok");
}

#[tokio::test]
async fn test_readiness_follows_store() {
    let app = TestApp::new().await;
    assert_eq!(app.get("/health/ready").await.status, StatusCode::OK);

    app.store.set_unavailable(true);
    assert_eq!(
        app.get("/health/ready").await.status,
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[tokio::test]
async fn test_request_id_is_generated_or_echoed() {
    let app = TestApp::new().await;

    let generated = app.get("/health").await;
    assert!(generated.header("x-request-id").is_some_and(|id| id.len() == 36));

    let echoed = app
        .send(
            axum::http::Request::get("/health")
                .header("x-request-id", "req-123")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(echoed.header("x-request-id"), Some("req-123"));
}

#[tokio::test]
async fn test_anonymous_request_without_address_is_bad_request() {
    let app = TestApp::new().await;
    let upload = picmaker_integration_tests::TestUpload::jpeg();

    let response = app
        .send(
            axum::http::Request::post("/pictures/example/thumbnail")
                .header(
                    "content-type",
                    format!(
                        "multipart/form-data; boundary={}",
                        picmaker_integration_tests::BOUNDARY
                    ),
                )
                .body(axum::body::Body::from(upload.body()))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.engine.calls(), 0);
}
