//! Persistence for users and the picture audit log.
//!
//! # Tables
//!
//! - `users` - Accounts that may request any quality tier
//! - `user_picture` - One row per picture delivered to an authenticated user
//! - `free_picture` - One row per picture delivered to an anonymous origin
//!
//! The orchestrator only sees the [`UserStore`] and [`AuditStore`] traits.
//! Production wires in the `PostgreSQL` repositories; tests use
//! [`MemoryStore`].
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p picmaker-cli -- migrate
//! ```

pub mod memory;
pub mod pictures;
pub mod users;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use picmaker_core::{Email, Origin};

use crate::models::picture::{FreePicture, NewFreePicture, NewUserPicture, UserPicture};
use crate::models::user::{NewUser, User};

pub use memory::MemoryStore;
pub use pictures::PgPictureRepository;
pub use users::PgUserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Account storage.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is already registered.
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError>;

    /// Look up an account and its password hash by email.
    async fn get_by_email(&self, email: &Email)
    -> Result<Option<(User, String)>, RepositoryError>;

    /// Enable or disable an account. Returns `false` when no account matched.
    async fn set_active(&self, email: &Email, active: bool) -> Result<bool, RepositoryError>;

    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Append-only audit log of delivered pictures.
///
/// Appends and reads may run concurrently from any number of requests.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append_free(&self, record: NewFreePicture) -> Result<FreePicture, RepositoryError>;

    async fn append_user(&self, record: NewUserPicture) -> Result<UserPicture, RepositoryError>;

    /// Count anonymous records for `origin` with `start <= created_at < end`.
    async fn count_free_between(
        &self,
        origin: &Origin,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique-constraint violation to `Conflict`, everything else to `Database`.
pub(crate) fn conflict_or_database(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}
