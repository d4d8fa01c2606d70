//! Audit records for delivered pictures.
//!
//! Records are written once, after the artifact exists and before it is
//! handed back, and are never updated or deleted.

use chrono::{DateTime, Utc};

use picmaker_core::{FreePictureId, Origin, QualityTier, UserId, UserPictureId};

/// A picture delivered to an anonymous origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreePicture {
    pub id: FreePictureId,
    pub origin: Origin,
    pub quality: QualityTier,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFreePicture {
    pub origin: Origin,
    pub quality: QualityTier,
    pub created_at: DateTime<Utc>,
}

/// A picture persisted for an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPicture {
    pub id: UserPictureId,
    pub user_id: UserId,
    /// Name of the artifact inside the owner's directory.
    pub file_name: String,
    pub quality: QualityTier,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUserPicture {
    pub user_id: UserId,
    pub file_name: String,
    pub quality: QualityTier,
    pub created_at: DateTime<Utc>,
}
