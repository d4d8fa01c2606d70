//! Engine adapter that runs an external program once per job.
//!
//! The program is invoked as
//!
//! ```text
//! <program> --input <file> --output <file> --face <0-based index>
//!           --size <pixels|original> --center <#rrggbb> --outer <#rrggbb>
//!           [--border <#rrggbb>]
//! ```
//!
//! and reports on stdout with one JSON line:
//!
//! - `{"status":"ok","faces":N}`
//! - `{"status":"no_face"}`
//! - `{"status":"face_out_of_range","faces":N}`
//!
//! A missing or unreadable status line, a non-zero exit without a status,
//! a timeout or a spawn failure are all [`EngineError::Failed`].

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use super::{Artifact, EngineError, EngineJob, PictureEngine};
use crate::config::EngineConfig;

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Status {
    Ok { faces: usize },
    NoFace,
    FaceOutOfRange { faces: usize },
}

/// Runs the configured engine program.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: PathBuf,
    timeout: Duration,
}

impl CommandEngine {
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            program: config.program.clone(),
            timeout: config.timeout,
        }
    }

    fn command(&self, job: &EngineJob) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--input")
            .arg(&job.input)
            .arg("--output")
            .arg(&job.output)
            .arg("--face")
            .arg(job.face_index.zero_based().to_string())
            .arg("--size")
            .arg(job.dimension.to_string())
            .arg("--center")
            .arg(job.colors.center.to_hex())
            .arg("--outer")
            .arg(job.colors.outer.to_hex());
        if let Some(border) = job.colors.border {
            cmd.arg("--border").arg(border.to_hex());
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl PictureEngine for CommandEngine {
    async fn process(&self, job: &EngineJob) -> Result<Artifact, EngineError> {
        let output = tokio::time::timeout(self.timeout, self.command(job).output())
            .await
            .map_err(|_| {
                EngineError::Failed(format!("timed out after {}s", self.timeout.as_secs()))
            })?
            .map_err(|e| EngineError::Failed(format!("failed to run {}: {e}", self.program.display())))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let Some(status) = parse_status(&stdout) else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Failed(format!(
                "exit code {:?}, no status line: {}",
                output.status.code(),
                stderr.trim()
            )));
        };

        match status {
            Status::Ok { faces } if output.status.success() => {
                if tokio::fs::metadata(&job.output).await.is_err() {
                    return Err(EngineError::Failed("engine reported success without output".to_owned()));
                }
                Ok(Artifact {
                    path: job.output.clone(),
                    faces,
                })
            }
            Status::Ok { .. } => Err(EngineError::Failed(format!(
                "exit code {:?} after reporting success",
                output.status.code()
            ))),
            Status::NoFace => Err(EngineError::NoFaceDetected),
            Status::FaceOutOfRange { faces } => Err(EngineError::FaceOutOfRange {
                requested: job.face_index.one_based(),
                detected: faces,
            }),
        }
    }
}

/// The last line of stdout that parses as a status.
fn parse_status(stdout: &str) -> Option<Status> {
    stdout
        .lines()
        .rev()
        .find_map(|line| serde_json::from_str(line.trim()).ok())
}
