//! Authenticated picture requests: every tier, stored per owner.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use picmaker_core::Email;
use picmaker_integration_tests::{EngineMode, TestApp, TestOptions, TestUpload};
use picmaker_server::db::UserStore;

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new().await;

    let response = app
        .my_picture("fullsize", "", None, &TestUpload::jpeg())
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.header("www-authenticate"), Some("Bearer"));
    assert_eq!(app.engine.calls(), 0);
}

#[tokio::test]
async fn test_garbage_token_is_unauthorized() {
    let app = TestApp::new().await;

    let response = app
        .my_picture("fullsize", "", Some("not.a.token"), &TestUpload::jpeg())
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.detail(), "Could not validate credentials");
}

#[tokio::test]
async fn test_stores_pictures_with_increasing_sequence() {
    let app = TestApp::new().await;
    let token = app.token_for("owner@example.com").await;
    let upload = TestUpload::jpeg();

    for _ in 0..2 {
        let response = app
            .my_picture("fullsize", "", Some(&token), &upload)
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.header("content-type"), Some("image/png"));
        assert_eq!(response.header("pic-url"), Some("pending"));
        assert!(!response.body.is_empty());
    }

    let names: Vec<String> = TestApp::files_under(&app.storage.resources_dir)
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["me_fullsize_0.png", "me_fullsize_1.png"]);

    let records = app.store.user_pictures().await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].file_name, "me_fullsize_0.png");
    assert_eq!(records[1].file_name, "me_fullsize_1.png");
    assert!(app.store.free_pictures().await.is_empty());
    assert_eq!(app.staged_entries(), 0);
}

#[tokio::test]
async fn test_user_ceiling_is_larger_than_anonymous() {
    let app = TestApp::new().await;
    let token = app.token_for("big@example.com").await;
    let upload = TestUpload::jpeg().with_size(2048);

    let anonymous = app.example("thumbnail", "", &app.fresh_ip(), &upload).await;
    assert_eq!(anonymous.status, StatusCode::PAYLOAD_TOO_LARGE);

    let owned = app.my_picture("thumbnail", "", Some(&token), &upload).await;
    assert_eq!(owned.status, StatusCode::OK);

    let huge = TestUpload::jpeg().with_size(8192);
    let rejected = app.my_picture("thumbnail", "", Some(&token), &huge).await;
    assert_eq!(rejected.status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_disabled_account_is_rejected_before_staging() {
    let app = TestApp::new().await;
    let token = app.token_for("gone@example.com").await;
    let email = Email::parse("gone@example.com").unwrap();
    assert!(app.store.set_active(&email, false).await.unwrap());

    let response = app
        .my_picture("medium", "", Some(&token), &TestUpload::jpeg())
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.engine.calls(), 0);
    assert_eq!(app.staged_entries(), 0);
    assert!(app.store.user_pictures().await.is_empty());
}

#[tokio::test]
async fn test_no_face_leaves_nothing_behind() {
    let app = TestApp::with_options(TestOptions {
        engine: EngineMode::NoFace,
        ..TestOptions::default()
    })
    .await;
    let token = app.token_for("noface@example.com").await;

    let response = app
        .my_picture("high", "", Some(&token), &TestUpload::jpeg())
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert!(TestApp::files_under(&app.storage.resources_dir).is_empty());
    assert!(app.store.user_pictures().await.is_empty());
}

#[tokio::test]
async fn test_no_daily_limit_for_accounts() {
    let app = TestApp::with_options(TestOptions {
        daily_limit: 0,
        ..TestOptions::default()
    })
    .await;
    let token = app.token_for("many@example.com").await;

    for _ in 0..3 {
        let response = app
            .my_picture("thumbnail", "", Some(&token), &TestUpload::jpeg())
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.header("pics-left-day"), None);
    }
}
