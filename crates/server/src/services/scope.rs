//! File lifetimes for uploads and produced pictures.
//!
//! - Uploads are staged in a private directory per request. The directory is
//!   removed when the [`ScopedFile`] is dropped, whichever way the request
//!   ends (including the request future being dropped on disconnect).
//! - Anonymous results are moved to `retained/` and deleted after the
//!   retention period. Deletion is best effort; [`ResourceScope::sweep_retained`]
//!   catches anything a restart left behind.
//! - Authenticated results are persisted as
//!   `resources/{user_id}/{base}_{tier}_{sequence}.png`. The name is reserved
//!   with an exclusive create before any work is committed, so two requests
//!   never end up with the same file.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tempfile::TempDir;
use thiserror::Error;
use uuid::Uuid;

use picmaker_core::{QualityTier, UserId};

use crate::config::StorageConfig;

/// Extension of every produced picture.
pub const OUTPUT_EXTENSION: &str = "png";

/// Errors raised while managing picture files.
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no free artifact name for {0}")]
    NamesExhausted(String),
}

impl ScopeError {
    fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A staged upload plus room for the engine's output.
///
/// Everything lives in one private directory that is removed on drop.
#[derive(Debug)]
pub struct ScopedFile {
    dir: TempDir,
    input: PathBuf,
}

impl ScopedFile {
    /// The staged upload.
    #[must_use]
    pub fn input_path(&self) -> &Path {
        &self.input
    }

    /// Where the engine should write its result.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.dir.path().join(format!("output.{OUTPUT_EXTENSION}"))
    }

    /// The private directory backing this file.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

/// An exclusively created placeholder for a persisted picture.
///
/// Dropping it without [`ReservedArtifact::keep`] removes the file so the
/// sequence number becomes free again, whether it still holds the empty
/// placeholder or a picture moved in by [`ResourceScope::place`].
#[derive(Debug)]
pub struct ReservedArtifact {
    path: PathBuf,
    file_name: String,
    committed: bool,
}

impl ReservedArtifact {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name inside the owner's directory, as recorded in the audit log.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Keep the file for good and return its path.
    #[must_use]
    pub fn keep(mut self) -> PathBuf {
        self.committed = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ReservedArtifact {
    fn drop(&mut self) {
        if !self.committed
            && let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != io::ErrorKind::NotFound
        {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to release artifact name");
        }
    }
}

/// Owns the storage layout and hands out scoped files.
#[derive(Debug, Clone)]
pub struct ResourceScope {
    storage: StorageConfig,
}

impl ResourceScope {
    #[must_use]
    pub const fn new(storage: StorageConfig) -> Self {
        Self { storage }
    }

    #[must_use]
    pub const fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    /// Create the storage directories.
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::Io` if a directory cannot be created.
    pub async fn prepare(&self) -> Result<(), ScopeError> {
        for dir in [
            &self.storage.staging_dir,
            &self.storage.retained_dir,
            &self.storage.resources_dir,
        ] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| ScopeError::io("create", dir, e))?;
        }
        Ok(())
    }

    /// Copy `bytes` into a fresh private directory under `staging/`.
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::Io` if the directory or file cannot be written.
    pub async fn stage(&self, bytes: &[u8], extension: &str) -> Result<ScopedFile, ScopeError> {
        let staging = &self.storage.staging_dir;
        tokio::fs::create_dir_all(staging)
            .await
            .map_err(|e| ScopeError::io("create", staging, e))?;

        let dir = tempfile::Builder::new()
            .prefix("upload-")
            .tempdir_in(staging)
            .map_err(|e| ScopeError::io("create", staging, e))?;

        let input = dir.path().join(format!("input.{extension}"));
        tokio::fs::write(&input, bytes)
            .await
            .map_err(|e| ScopeError::io("write", &input, e))?;

        tracing::debug!(path = %input.display(), size = bytes.len(), "Upload staged");
        Ok(ScopedFile { dir, input })
    }

    /// Keep an anonymous result addressable for `ttl`, then delete it.
    ///
    /// Returns the retained path.
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::Io` if the file cannot be moved.
    pub async fn retain_for(&self, output: &Path, ttl: Duration) -> Result<PathBuf, ScopeError> {
        let retained_dir = &self.storage.retained_dir;
        tokio::fs::create_dir_all(retained_dir)
            .await
            .map_err(|e| ScopeError::io("create", retained_dir, e))?;

        let target = retained_dir.join(format!("{}.{OUTPUT_EXTENSION}", Uuid::new_v4()));
        move_file(output, &target).await?;

        let expiring = target.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Err(e) = tokio::fs::remove_file(&expiring).await
                && e.kind() != io::ErrorKind::NotFound
            {
                tracing::warn!(path = %expiring.display(), error = %e, "Failed to expire retained picture");
            }
        });

        Ok(target)
    }

    /// Reserve the next free `{base}_{tier}_{sequence}.png` in the owner's
    /// directory, starting at sequence 0.
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::Io` if the directory or placeholder cannot be created.
    pub async fn reserve(
        &self,
        owner: UserId,
        tier: QualityTier,
        base_name: &str,
    ) -> Result<ReservedArtifact, ScopeError> {
        let dir = self.storage.resources_dir.join(owner.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ScopeError::io("create", &dir, e))?;

        for sequence in 0..u32::MAX {
            let file_name = format!("{base_name}_{tier}_{sequence}.{OUTPUT_EXTENSION}");
            let path = dir.join(&file_name);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(_) => {
                    return Ok(ReservedArtifact {
                        path,
                        file_name,
                        committed: false,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(ScopeError::io("reserve", &path, e)),
            }
        }

        Err(ScopeError::NamesExhausted(format!("{base_name}_{tier}")))
    }

    /// Move a produced picture onto its reserved name.
    ///
    /// The reservation stays uncommitted: dropping it still deletes the file
    /// until [`ReservedArtifact::keep`] is called.
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::Io` if the file cannot be moved.
    pub async fn place(&self, artifact: &ReservedArtifact, output: &Path) -> Result<(), ScopeError> {
        move_file(output, &artifact.path).await
    }

    /// Delete retained pictures older than the retention period.
    ///
    /// Returns the number of files removed.
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::Io` if the directory cannot be listed.
    pub async fn sweep_retained(&self) -> Result<usize, ScopeError> {
        let dir = &self.storage.retained_dir;
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(ScopeError::io("list", dir, e)),
        };

        let now = SystemTime::now();
        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ScopeError::io("list", dir, e))?
        {
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            let expired = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_none_or(|age| age >= self.storage.retention);
            if metadata.is_file() && expired && tokio::fs::remove_file(entry.path()).await.is_ok() {
                removed += 1;
            }
        }

        Ok(removed)
    }
}

/// Rename, falling back to copy + remove across file systems.
async fn move_file(from: &Path, to: &Path) -> Result<(), ScopeError> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to)
        .await
        .map_err(|e| ScopeError::io("copy", from, e))?;
    tokio::fs::remove_file(from)
        .await
        .map_err(|e| ScopeError::io("remove", from, e))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn scope(root: &Path) -> ResourceScope {
        let mut storage = StorageConfig::under(root);
        storage.retention = Duration::from_millis(50);
        ResourceScope::new(storage)
    }

    fn staged_entries(scope: &ResourceScope) -> usize {
        std::fs::read_dir(&scope.storage().staging_dir)
            .map(Iterator::count)
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_stage_is_private_and_released_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let scope = scope(root.path());

        let first = scope.stage(b"one", "jpg").await.unwrap();
        let second = scope.stage(b"two", "jpg").await.unwrap();
        assert_ne!(first.input_path(), second.input_path());
        assert_eq!(std::fs::read(first.input_path()).unwrap(), b"one");
        assert!(first.output_path().starts_with(first.dir()));
        assert_eq!(staged_entries(&scope), 2);

        let dir = first.dir().to_path_buf();
        drop(first);
        assert!(!dir.exists());
        drop(second);
        assert_eq!(staged_entries(&scope), 0);
    }

    #[tokio::test]
    async fn test_retained_output_expires() {
        let root = tempfile::tempdir().unwrap();
        let scope = scope(root.path());
        let staged = scope.stage(b"in", "png").await.unwrap();
        std::fs::write(staged.output_path(), b"out").unwrap();

        let retained = scope
            .retain_for(&staged.output_path(), Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(std::fs::read(&retained).unwrap(), b"out");
        assert!(!staged.output_path().exists());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!retained.exists());
    }

    #[tokio::test]
    async fn test_reserve_starts_at_zero_and_never_collides() {
        let root = tempfile::tempdir().unwrap();
        let scope = scope(root.path());
        let owner = UserId::generate();

        let first = scope.reserve(owner, QualityTier::High, "me").await.unwrap();
        let second = scope.reserve(owner, QualityTier::High, "me").await.unwrap();
        assert_eq!(first.file_name(), "me_high_0.png");
        assert_eq!(second.file_name(), "me_high_1.png");
        assert!(first.path().ends_with(format!("{owner}/me_high_0.png")));

        drop(first);
        let again = scope.reserve(owner, QualityTier::High, "me").await.unwrap();
        assert_eq!(again.file_name(), "me_high_0.png");
    }

    #[tokio::test]
    async fn test_keep_after_place_keeps_file() {
        let root = tempfile::tempdir().unwrap();
        let scope = scope(root.path());
        let staged = scope.stage(b"in", "png").await.unwrap();
        std::fs::write(staged.output_path(), b"picture").unwrap();

        let reserved = scope
            .reserve(UserId::generate(), QualityTier::Medium, "face")
            .await
            .unwrap();
        scope.place(&reserved, &staged.output_path()).await.unwrap();
        let path = reserved.keep();
        drop(staged);

        assert_eq!(std::fs::read(&path).unwrap(), b"picture");
    }

    #[tokio::test]
    async fn test_placed_but_not_kept_is_deleted() {
        let root = tempfile::tempdir().unwrap();
        let scope = scope(root.path());
        let staged = scope.stage(b"in", "png").await.unwrap();
        std::fs::write(staged.output_path(), b"picture").unwrap();

        let reserved = scope
            .reserve(UserId::generate(), QualityTier::Medium, "face")
            .await
            .unwrap();
        scope.place(&reserved, &staged.output_path()).await.unwrap();
        let path = reserved.path().to_path_buf();
        drop(reserved);

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let root = tempfile::tempdir().unwrap();
        let scope = scope(root.path());
        scope.prepare().await.unwrap();

        let old = scope.storage().retained_dir.join("old.png");
        std::fs::write(&old, b"x").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let fresh = scope.storage().retained_dir.join("fresh.png");
        std::fs::write(&fresh, b"x").unwrap();

        assert_eq!(scope.sweep_retained().await.unwrap(), 1);
        assert!(!old.exists());
        assert!(fresh.exists());
    }
}
