//! Account endpoints: registration, password login, profile.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use picmaker_integration_tests::TestApp;

#[tokio::test]
async fn test_register_returns_public_profile() {
    let app = TestApp::new().await;

    let response = app
        .register("Ada Lovelace", "Ada@Example.com", "analytical")
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let body = response.json();
    assert_eq!(body["name"], "Ada Lovelace");
    assert_eq!(body["email"], "ada@example.com");
    assert!(body["user_id"].is_string());
    assert!(body.get("password").is_none());
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = TestApp::new().await;
    app.register("First", "dup@example.com", "password1").await;

    let response = app.register("Second", "DUP@example.com", "password2").await;

    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_validation_failures() {
    let app = TestApp::new().await;
    let long_password = "x".repeat(51);

    let cases = [
        ("ab", "short-name@example.com", "password1"),
        ("Valid Name", "not-an-email", "password1"),
        ("Valid Name", "short-pass@example.com", "short"),
        ("Valid Name", "long-pass@example.com", long_password.as_str()),
    ];
    for (name, email, password) in cases {
        let response = app.register(name, email, password).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{name} {email}");
    }
}

#[tokio::test]
async fn test_register_malformed_json() {
    let app = TestApp::new().await;

    let response = app.register_raw("{\"name\": ", &app.fresh_ip()).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_issues_bearer_token() {
    let app = TestApp::new().await;
    app.register("Grace", "grace@example.com", "cobol rules").await;

    let response = app.login("grace@example.com", "cobol rules").await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["token_type"], "bearer");
    assert!(!body["access_token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_login_failures_look_the_same() {
    let app = TestApp::new().await;
    app.register("Grace", "grace@example.com", "cobol rules").await;

    let wrong_password = app.login("grace@example.com", "fortran rules").await;
    let unknown = app.login("nobody@example.com", "cobol rules").await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body, unknown.body);
    assert_eq!(wrong_password.header("www-authenticate"), Some("Bearer"));
}

#[tokio::test]
async fn test_my_user_returns_token_owner() {
    let app = TestApp::new().await;
    let token = app.token_for("me@example.com").await;

    let response = app
        .send(
            axum::http::Request::get("/users/myuser")
                .header("authorization", format!("Bearer {token}"))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["email"], "me@example.com");
}

#[tokio::test]
async fn test_my_user_requires_token() {
    let app = TestApp::new().await;

    let response = app.get("/users/myuser").await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_is_rate_limited_per_address() {
    let app = TestApp::new().await;
    let ip = app.fresh_ip();

    for _ in 0..5 {
        let response = app.login_from("nobody@example.com", "whatever1", &ip).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    let limited = app.login_from("nobody@example.com", "whatever1", &ip).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);

    let other = app.login("nobody@example.com", "whatever1").await;
    assert_eq!(other.status, StatusCode::UNAUTHORIZED);
}
