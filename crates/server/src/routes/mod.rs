//! HTTP route handlers for the picture service.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                          - Home page
//! GET  /health                    - Liveness check
//! GET  /health/ready              - Readiness check (account store)
//!
//! # Pictures
//! POST /pictures/example/{tier}   - Anonymous picture (free tiers, daily limit)
//! POST /pictures/mypicture/{tier} - Authenticated picture (all tiers)
//!
//! # Users
//! POST /users/token               - Password grant, returns a bearer token (rate limited)
//! POST /users/new_user            - Register an account (rate limited)
//! GET  /users/myuser              - Current account (requires auth)
//! ```

pub mod health;
pub mod home;
pub mod pictures;
pub mod users;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{auth_rate_limiter, request_id_middleware};
use crate::state::AppState;

/// Create the picture routes router.
pub fn picture_routes() -> Router<AppState> {
    Router::new()
        .route("/example/{tier}", post(pictures::example))
        .route("/mypicture/{tier}", post(pictures::my_picture))
}

/// Create the account routes router.
pub fn user_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/token", post(users::token))
        .route("/new_user", post(users::new_user))
        .route_layer(auth_rate_limiter());

    Router::new()
        .route("/myuser", get(users::my_user))
        .merge(limited)
}

/// Create all routes for the picture service.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/pictures", picture_routes())
        .nest("/users", user_routes())
}

/// Assemble the full application with health checks and middleware.
///
/// The caller serves it with `into_make_service_with_connect_info` so the
/// socket address is available when no proxy header names the client.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config().uploads.body_limit();

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .merge(routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
