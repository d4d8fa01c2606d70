//! In-process store for tests and local experiments.
//!
//! Implements both [`UserStore`] and [`AuditStore`] on plain collections
//! behind a single async mutex. Nothing survives a restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use picmaker_core::{Email, FreePictureId, Origin, UserId, UserPictureId};

use super::{AuditStore, RepositoryError, UserStore};
use crate::models::picture::{FreePicture, NewFreePicture, NewUserPicture, UserPicture};
use crate::models::user::{NewUser, User};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, (User, String)>,
    free_pictures: Vec<FreePicture>,
    user_pictures: Vec<UserPicture>,
}

/// Memory-backed store.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the database were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of the anonymous audit log.
    pub async fn free_pictures(&self) -> Vec<FreePicture> {
        self.tables.lock().await.free_pictures.clone()
    }

    /// Snapshot of the authenticated audit log.
    pub async fn user_pictures(&self) -> Vec<UserPicture> {
        self.tables.lock().await.user_pictures.clone()
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|(u, _)| u.email == user.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        let created = User {
            id: UserId::generate(),
            name: user.name,
            email: user.email,
            active: true,
            created_at: Utc::now(),
        };
        tables
            .users
            .insert(created.id, (created.clone(), user.password_hash));
        Ok(created)
    }

    async fn get_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|(user, _)| &user.email == email)
            .cloned())
    }

    async fn set_active(&self, email: &Email, active: bool) -> Result<bool, RepositoryError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let Some((user, _)) = tables.users.values_mut().find(|(u, _)| &u.email == email) else {
            return Ok(false);
        };
        user.active = active;
        Ok(true)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.check_available()
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append_free(&self, record: NewFreePicture) -> Result<FreePicture, RepositoryError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let next = i64::try_from(tables.free_pictures.len())
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?
            + 1;
        let picture = FreePicture {
            id: FreePictureId::new(next),
            origin: record.origin,
            quality: record.quality,
            created_at: record.created_at,
        };
        tables.free_pictures.push(picture.clone());
        Ok(picture)
    }

    async fn append_user(&self, record: NewUserPicture) -> Result<UserPicture, RepositoryError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let next = i64::try_from(tables.user_pictures.len())
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?
            + 1;
        let picture = UserPicture {
            id: UserPictureId::new(next),
            user_id: record.user_id,
            file_name: record.file_name,
            quality: record.quality,
            created_at: record.created_at,
        };
        tables.user_pictures.push(picture.clone());
        Ok(picture)
    }

    async fn count_free_between(
        &self,
        origin: &Origin,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        let count = tables
            .free_pictures
            .iter()
            .filter(|p| &p.origin == origin && p.created_at >= start && p.created_at < end)
            .count();
        Ok(count as u64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use picmaker_core::QualityTier;

    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Someone".to_owned(),
            email: Email::parse(email).unwrap(),
            password_hash: "hash".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        store.create(new_user("a@example.com")).await.unwrap();
        let err = store.create(new_user("A@Example.com")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_set_active_round_trip() {
        let store = MemoryStore::new();
        let user = store.create(new_user("a@example.com")).await.unwrap();
        assert!(user.active);

        assert!(store.set_active(&user.email, false).await.unwrap());
        let (stored, _) = store.get_by_email(&user.email).await.unwrap().unwrap();
        assert!(!stored.active);

        let missing = Email::parse("nobody@example.com").unwrap();
        assert!(!store.set_active(&missing, false).await.unwrap());
    }

    #[tokio::test]
    async fn test_count_uses_half_open_window() {
        let store = MemoryStore::new();
        let origin = Origin::from("10.0.0.1");
        let start = Utc::now() - Duration::hours(1);
        let end = start + Duration::hours(24);

        for created_at in [start - Duration::seconds(1), start, end - Duration::seconds(1), end] {
            store
                .append_free(NewFreePicture {
                    origin: origin.clone(),
                    quality: QualityTier::Thumbnail,
                    created_at,
                })
                .await
                .unwrap();
        }

        assert_eq!(store.count_free_between(&origin, start, end).await.unwrap(), 2);
        let other = Origin::from("10.0.0.2");
        assert_eq!(store.count_free_between(&other, start, end).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(store.ping().await.is_err());
        store.set_unavailable(false);
        assert!(store.ping().await.is_ok());
    }
}
