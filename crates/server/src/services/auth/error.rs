//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] picmaker_core::EmailError),

    /// Display name outside the accepted length.
    #[error("name must be between {min} and {max} characters")]
    InvalidName { min: usize, max: usize },

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Nothing to hash.
    #[error("password cannot be empty")]
    EmptyPassword,

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Bearer token missing, malformed, expired, forged or naming an unknown user.
    #[error("could not validate credentials")]
    Unauthenticated,

    /// The signing key is unusable.
    #[error("token signing failed: {0}")]
    Signing(String),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
