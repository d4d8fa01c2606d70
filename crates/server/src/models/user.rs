//! User domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};

use picmaker_core::{Email, UserId};

/// An account that may request every quality tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Login name and token subject.
    pub email: Email,
    /// Disabled accounts are refused before any work is done.
    pub active: bool,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
}

/// Input for [`crate::db::UserStore::create`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    pub password_hash: String,
}
