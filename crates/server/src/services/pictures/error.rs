//! Picture request errors.
//!
//! Every failure inside the orchestrator collapses into one [`PictureError`]
//! before it reaches a handler.

use thiserror::Error;

use picmaker_core::{ColorError, FaceIndexError, QualityTier, TierError};

/// Input the caller has to fix.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unsupported content type '{0}', supported content types are image/jpeg and image/png")]
    UnsupportedContentType(String),

    #[error("file size {size} bytes exceeds the limit of {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error(transparent)]
    InvalidTier(#[from] TierError),

    #[error("quality '{0}' requires an account")]
    TierNotAllowed(QualityTier),

    #[error(transparent)]
    InvalidFaceIndex(#[from] FaceIndexError),

    #[error("face {requested} requested but only {detected} detected")]
    FaceIndexOutOfRange { requested: usize, detected: usize },

    #[error(transparent)]
    InvalidColor(#[from] ColorError),

    #[error("missing multipart field 'picture_file'")]
    MissingFile,

    #[error("malformed request: {0}")]
    Malformed(String),
}

/// Outcome of a rejected picture request.
#[derive(Debug, Error)]
pub enum PictureError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("daily limit reached")]
    QuotaExceeded,

    #[error("could not validate credentials")]
    Unauthenticated,

    #[error("account is disabled")]
    Forbidden,

    #[error("no face detected in the picture")]
    NoFaceDetected,

    /// Opaque to the caller; the cause has already been logged.
    #[error("picture processing failed")]
    Processing,

    /// The audit log or the account store could not be written or read.
    #[error("persistence failed")]
    Persistence,
}
