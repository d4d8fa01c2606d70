//! Pic Profile Maker - Picture request service.
//!
//! This binary serves the picture API on port 8000.
//!
//! # Architecture
//!
//! - Axum web framework, JSON and multipart endpoints
//! - `PostgreSQL` for accounts and the picture audit log
//! - External processing engine invoked once per picture
//! - Local storage for staging, short-lived retention and per-owner pictures
//!
//! Anonymous callers get the free tiers under a daily limit per network
//! origin. Account holders get every tier, stored under their own directory.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::Arc;

use picmaker_server::config::PicsConfig;
use picmaker_server::db::{self, PgPictureRepository, PgUserRepository};
use picmaker_server::routes;
use picmaker_server::services::engine::CommandEngine;
use picmaker_server::state::AppState;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &PicsConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry.dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry
                .environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry.sample_rate,
            traces_sample_rate: config.sentry.traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = PicsConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "picmaker_server=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p picmaker-cli -- migrate

    let engine = CommandEngine::new(&config.engine);
    tracing::info!(program = %config.engine.program.display(), "Processing engine configured");

    let state = AppState::new(
        config.clone(),
        Arc::new(PgUserRepository::new(pool.clone())),
        Arc::new(PgPictureRepository::new(pool)),
        Arc::new(engine),
    );

    // Retention timers do not survive a restart
    let scope = state.pictures().scope();
    scope
        .prepare()
        .await
        .expect("Failed to create storage directories");
    match scope.sweep_retained().await {
        Ok(removed) => tracing::info!(removed, "Swept retained pictures"),
        Err(e) => tracing::warn!(error = %e, "Failed to sweep retained pictures"),
    }

    let app = routes::app(state);

    let addr = config.socket_addr();
    tracing::info!("picmaker-server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
