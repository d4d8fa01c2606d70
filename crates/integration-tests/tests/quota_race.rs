//! Concurrent anonymous requests from one origin.
//!
//! The daily count is read before the picture is produced and the audit
//! record is written after, so requests that overlap can all be admitted.
//! This is accepted behaviour; the test pins down its extent.

use std::sync::Arc;

use axum::http::StatusCode;
use picmaker_integration_tests::{EngineMode, TestApp, TestOptions, TestUpload};
use tokio::sync::Barrier;

#[tokio::test]
async fn test_overlapping_requests_can_exceed_the_limit_by_one() {
    let barrier = Arc::new(Barrier::new(2));
    let app = TestApp::with_options(TestOptions {
        daily_limit: 0,
        engine: EngineMode::Gate(Arc::clone(&barrier)),
        ..TestOptions::default()
    })
    .await;
    let ip = app.fresh_ip();
    let upload = TestUpload::jpeg();

    // Both requests pass the quota check before either reaches the engine's
    // barrier, and neither is audited until both have been admitted.
    let (first, second) = tokio::join!(
        app.example("thumbnail", "", &ip, &upload),
        app.example("thumbnail", "", &ip, &upload),
    );

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(app.store.free_pictures().await.len(), 2);

    let third = app.example("thumbnail", "", &ip, &upload).await;
    assert_eq!(third.status, StatusCode::NOT_ACCEPTABLE);
    assert_eq!(app.engine.calls(), 2);
}
