//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::PicsConfig;
use crate::db::{AuditStore, UserStore};
use crate::services::auth::{AuthService, TokenSigner};
use crate::services::engine::PictureEngine;
use crate::services::pictures::PictureOrchestrator;
use crate::services::scope::ResourceScope;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. Stores and the engine are
/// injected so tests can run the full router against in-memory doubles.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: PicsConfig,
    users: Arc<dyn UserStore>,
    auth: AuthService,
    pictures: PictureOrchestrator,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    /// * `users` - Account store
    /// * `audit` - Picture audit log
    /// * `engine` - Picture processing capability
    #[must_use]
    pub fn new(
        config: PicsConfig,
        users: Arc<dyn UserStore>,
        audit: Arc<dyn AuditStore>,
        engine: Arc<dyn PictureEngine>,
    ) -> Self {
        let auth = AuthService::new(
            Arc::clone(&users),
            TokenSigner::new(config.token.secret.clone()),
            config.token.ttl,
        );
        let pictures = PictureOrchestrator::new(
            audit,
            engine,
            ResourceScope::new(config.storage.clone()),
            config.uploads,
            config.quota,
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                users,
                auth,
                pictures,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &PicsConfig {
        &self.inner.config
    }

    /// Get a reference to the account store.
    #[must_use]
    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.inner.users
    }

    /// Get a reference to the authentication service.
    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    /// Get a reference to the picture orchestrator.
    #[must_use]
    pub fn pictures(&self) -> &PictureOrchestrator {
        &self.inner.pictures
    }
}
