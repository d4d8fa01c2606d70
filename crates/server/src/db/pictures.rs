//! Picture audit log for `PostgreSQL`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use picmaker_core::{FreePictureId, Origin, UserPictureId};

use super::{AuditStore, RepositoryError};
use crate::models::picture::{FreePicture, NewFreePicture, NewUserPicture, UserPicture};

/// Repository for the `free_picture` and `user_picture` tables.
#[derive(Clone)]
pub struct PgPictureRepository {
    pool: PgPool,
}

impl PgPictureRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgPictureRepository {
    async fn append_free(&self, record: NewFreePicture) -> Result<FreePicture, RepositoryError> {
        let id: FreePictureId = sqlx::query_scalar(
            r"
            INSERT INTO free_picture (origin, quality, created_at)
            VALUES ($1, $2, $3)
            RETURNING id
            ",
        )
        .bind(record.origin.as_str())
        .bind(record.quality)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(FreePicture {
            id,
            origin: record.origin,
            quality: record.quality,
            created_at: record.created_at,
        })
    }

    async fn append_user(&self, record: NewUserPicture) -> Result<UserPicture, RepositoryError> {
        let id: UserPictureId = sqlx::query_scalar(
            r"
            INSERT INTO user_picture (user_id, file_name, quality, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(record.user_id)
        .bind(&record.file_name)
        .bind(record.quality)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(UserPicture {
            id,
            user_id: record.user_id,
            file_name: record.file_name,
            quality: record.quality,
            created_at: record.created_at,
        })
    }

    async fn count_free_between(
        &self,
        origin: &Origin,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM free_picture
            WHERE origin = $1 AND created_at >= $2 AND created_at < $3
            ",
        )
        .bind(origin.as_str())
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        u64::try_from(count)
            .map_err(|_| RepositoryError::DataCorruption(format!("negative row count {count}")))
    }
}

