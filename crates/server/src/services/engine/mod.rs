//! The picture processing capability.
//!
//! Face detection, background removal and compositing happen outside this
//! crate. The orchestrator talks to them through [`PictureEngine`], so tests
//! can substitute a stub and production can use [`CommandEngine`].

mod command;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use picmaker_core::{ColorSpec, Dimension, FaceIndex};

pub use command::CommandEngine;

/// One processing job.
#[derive(Debug, Clone)]
pub struct EngineJob {
    /// Staged upload.
    pub input: PathBuf,
    /// Where the engine must write the PNG result.
    pub output: PathBuf,
    pub face_index: FaceIndex,
    pub dimension: Dimension,
    pub colors: ColorSpec,
}

/// A produced picture on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    /// Number of faces the engine detected in the upload.
    pub faces: usize,
}

/// Ways a job can fail.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no face detected in the picture")]
    NoFaceDetected,

    /// The requested face does not exist. The index is never clamped.
    #[error("face {requested} requested but only {detected} detected")]
    FaceOutOfRange { requested: usize, detected: usize },

    /// Anything else. The detail is for logs only.
    #[error("processing failed: {0}")]
    Failed(String),
}

/// Turns a staged upload into a finished picture.
#[async_trait]
pub trait PictureEngine: Send + Sync {
    /// Process `job`, writing the result to `job.output`.
    async fn process(&self, job: &EngineJob) -> Result<Artifact, EngineError>;
}
