//! Picture request orchestration.
//!
//! A request moves through
//! `Received -> Validated -> Admitted -> Staged -> Processed -> Audited -> Delivered`
//! and stops at the first rejection. Steps never run out of order:
//!
//! 1. Content type and size are checked against the caller's ceiling.
//! 2. Anonymous callers pass the daily quota, accounts must be active.
//!    Neither check has side effects.
//! 3. The upload is staged in a private directory.
//! 4. The engine produces the picture.
//! 5. Exactly one audit record is written. If that fails the picture is
//!    not handed out.
//! 6. The picture is retained (anonymous) or persisted (account) and its
//!    bytes returned.
//!
//! Staged files are owned by a [`ScopedFile`](super::scope::ScopedFile), so
//! every early return and a dropped request future release them.

mod error;
mod upload;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use picmaker_core::{ColorSpec, FaceIndex, Origin, QualityTier};

pub use error::{PictureError, ValidationError};
pub use upload::{ImageKind, Upload};

use crate::config::{QuotaConfig, UploadConfig};
use crate::db::AuditStore;
use crate::models::picture::{NewFreePicture, NewUserPicture};
use crate::models::user::User;
use crate::services::engine::{Artifact, EngineError, EngineJob, PictureEngine};
use crate::services::quota::{Admission, QuotaTracker};
use crate::services::scope::{ResourceScope, ScopedFile};

/// Caller-supplied options, still unvalidated.
#[derive(Debug, Clone, Default)]
pub struct PictureOptions {
    /// 1-based face number, defaults to 1.
    pub face_index: Option<i64>,
    pub center: Option<String>,
    pub outer: Option<String>,
    pub border: Option<String>,
}

/// One picture request.
#[derive(Debug, Clone)]
pub struct PictureRequest {
    pub upload: Upload,
    pub tier: QualityTier,
    pub options: PictureOptions,
}

/// Result of an anonymous request.
#[derive(Debug)]
pub struct FreeDelivery {
    pub bytes: Vec<u8>,
    /// Value of the `pics-left-day` header.
    pub remaining_today: u64,
}

/// Result of an authenticated request.
#[derive(Debug)]
pub struct UserDelivery {
    pub bytes: Vec<u8>,
    /// Name inside the owner's directory.
    pub file_name: String,
    pub path: PathBuf,
}

struct Validated {
    kind: ImageKind,
    face_index: FaceIndex,
    colors: ColorSpec,
}

/// Coordinates validation, admission, processing, audit and delivery.
#[derive(Clone)]
pub struct PictureOrchestrator {
    audit: Arc<dyn AuditStore>,
    engine: Arc<dyn PictureEngine>,
    quota: QuotaTracker,
    scope: ResourceScope,
    uploads: UploadConfig,
    daily_limits: QuotaConfig,
}

impl PictureOrchestrator {
    #[must_use]
    pub fn new(
        audit: Arc<dyn AuditStore>,
        engine: Arc<dyn PictureEngine>,
        scope: ResourceScope,
        uploads: UploadConfig,
        daily_limits: QuotaConfig,
    ) -> Self {
        Self {
            quota: QuotaTracker::new(Arc::clone(&audit)),
            audit,
            engine,
            scope,
            uploads,
            daily_limits,
        }
    }

    #[must_use]
    pub const fn scope(&self) -> &ResourceScope {
        &self.scope
    }

    /// Anonymous path: free tiers only, limited per origin and day.
    ///
    /// # Errors
    ///
    /// Returns the [`PictureError`] for the first step that rejects the request.
    #[instrument(skip(self, request), fields(origin = %origin, tier = %request.tier))]
    pub async fn make_free_picture(
        &self,
        origin: &Origin,
        request: PictureRequest,
    ) -> Result<FreeDelivery, PictureError> {
        if !request.tier.is_free() {
            return Err(ValidationError::TierNotAllowed(request.tier).into());
        }
        let validated = validate(&request, self.uploads.free_max_bytes)?;
        let limit = self.daily_limits.limit_for(request.tier);

        let remaining_today = match self
            .quota
            .check_and_admit(origin, limit)
            .await
            .map_err(|e| persistence_failure("count daily pictures", &e))?
        {
            Admission::Admitted { remaining, .. } => remaining,
            Admission::Rejected { used } => {
                tracing::info!(used, limit, "Daily limit reached");
                return Err(PictureError::QuotaExceeded);
            }
        };

        let staged = self.stage(&request, &validated).await?;
        let artifact = self.run_engine(&staged, &validated, request.tier).await?;
        let bytes = read_picture(&artifact.path).await?;

        self.audit
            .append_free(NewFreePicture {
                origin: origin.clone(),
                quality: request.tier,
                created_at: Utc::now(),
            })
            .await
            .map_err(|e| persistence_failure("record free picture", &e))?;

        let retention = self.scope.storage().retention;
        if let Err(e) = self.scope.retain_for(&artifact.path, retention).await {
            tracing::warn!(error = %e, "Failed to retain picture");
        }

        tracing::info!(remaining_today, "Free picture delivered");
        Ok(FreeDelivery {
            bytes,
            remaining_today,
        })
    }

    /// Authenticated path: every tier, persisted in the owner's directory.
    ///
    /// # Errors
    ///
    /// Returns the [`PictureError`] for the first step that rejects the request.
    #[instrument(skip(self, user, request), fields(user_id = %user.id, tier = %request.tier))]
    pub async fn make_user_picture(
        &self,
        user: &User,
        request: PictureRequest,
    ) -> Result<UserDelivery, PictureError> {
        let validated = validate(&request, self.uploads.user_max_bytes)?;
        if !user.active {
            tracing::info!("Rejected picture for disabled account");
            return Err(PictureError::Forbidden);
        }

        let staged = self.stage(&request, &validated).await?;
        let artifact = self.run_engine(&staged, &validated, request.tier).await?;

        let reserved = self
            .scope
            .reserve(user.id, request.tier, &request.upload.base_name())
            .await
            .map_err(|e| processing_failure(&e))?;
        self.scope
            .place(&reserved, &artifact.path)
            .await
            .map_err(|e| persistence_failure("persist user picture", &e))?;
        let bytes = read_picture(reserved.path()).await?;

        // Until the record exists the reservation is not kept, so any
        // failure or cancellation from here on deletes the file.
        let file_name = reserved.file_name().to_owned();
        self.audit
            .append_user(NewUserPicture {
                user_id: user.id,
                file_name: file_name.clone(),
                quality: request.tier,
                created_at: Utc::now(),
            })
            .await
            .map_err(|e| persistence_failure("record user picture", &e))?;
        let path = reserved.keep();

        tracing::info!(file_name = %file_name, "User picture delivered");
        Ok(UserDelivery {
            bytes,
            file_name,
            path,
        })
    }

    async fn stage(
        &self,
        request: &PictureRequest,
        validated: &Validated,
    ) -> Result<ScopedFile, PictureError> {
        self.scope
            .stage(&request.upload.bytes, validated.kind.extension())
            .await
            .map_err(|e| processing_failure(&e))
    }

    async fn run_engine(
        &self,
        staged: &ScopedFile,
        validated: &Validated,
        tier: QualityTier,
    ) -> Result<Artifact, PictureError> {
        let job = EngineJob {
            input: staged.input_path().to_path_buf(),
            output: staged.output_path(),
            face_index: validated.face_index,
            dimension: tier.dimension(),
            colors: validated.colors,
        };

        let artifact = self.engine.process(&job).await.map_err(|e| match e {
            EngineError::NoFaceDetected => PictureError::NoFaceDetected,
            EngineError::FaceOutOfRange {
                requested,
                detected,
            } => ValidationError::FaceIndexOutOfRange {
                requested,
                detected,
            }
            .into(),
            failed @ EngineError::Failed(_) => processing_failure(&failed),
        })?;

        tracing::debug!(faces = artifact.faces, "Engine finished");
        Ok(artifact)
    }
}

fn validate(request: &PictureRequest, max_bytes: u64) -> Result<Validated, ValidationError> {
    let upload = &request.upload;
    let kind = ImageKind::from_content_type(upload.content_type.as_deref())?;

    let size = upload.size();
    if size > max_bytes {
        return Err(ValidationError::TooLarge {
            size,
            max: max_bytes,
        });
    }

    let options = &request.options;
    let face_index = FaceIndex::from_one_based(options.face_index.unwrap_or(1))?;
    let colors = ColorSpec::from_parts(
        options.center.as_deref(),
        options.outer.as_deref(),
        options.border.as_deref(),
    )?;

    Ok(Validated {
        kind,
        face_index,
        colors,
    })
}

async fn read_picture(path: &Path) -> Result<Vec<u8>, PictureError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| processing_failure(&e))
}

fn processing_failure(error: &dyn std::error::Error) -> PictureError {
    tracing::error!(error = %error, "Picture processing failed");
    PictureError::Processing
}

fn persistence_failure(action: &str, error: &dyn std::error::Error) -> PictureError {
    tracing::error!(error = %error, action, "Persistence failed");
    PictureError::Persistence
}
