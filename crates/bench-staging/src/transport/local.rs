//! Local symlink staging.
//!
//! The staged entry is a symbolic link into the provider root pointing at the
//! source file. Content is not snapshotted: rewriting or deleting the source
//! changes what the link serves.

use super::Transport;
use crate::paths::{CacheLayout, StagePath};
use async_trait::async_trait;
use bench_core::{BenchError, BenchResult, Provider};
use std::io::ErrorKind;
use std::path::Path;

/// Stage by symlinking into a local directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalLink;

#[async_trait]
impl Transport for LocalLink {
    fn name(&self) -> &'static str {
        "local_link"
    }

    fn layout(&self) -> CacheLayout {
        CacheLayout::Flat
    }

    async fn exists(&self, dest: &StagePath, provider: &dyn Provider) -> BenchResult<bool> {
        let fail = |reason: String| BenchError::transfer("", &dest.absolute, provider.host(), reason);

        let entry = match tokio::fs::symlink_metadata(&dest.absolute).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(fail(format!("stat failed: {}", e))),
        };

        if entry.is_dir() {
            return Err(fail("destination is blocked by a directory".to_string()));
        }
        if !entry.file_type().is_symlink() {
            return Ok(true);
        }

        // A link only counts when its target is still there.
        match tokio::fs::metadata(&dest.absolute).await {
            Ok(target) => Ok(target.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(link = %dest.absolute.display(), "dangling staged link");
                Ok(false)
            }
            Err(e) => Err(fail(format!("stat failed: {}", e))),
        }
    }

    async fn copy(
        &self,
        local: &Path,
        dest: &StagePath,
        provider: &dyn Provider,
    ) -> BenchResult<()> {
        let fail = |reason: String| BenchError::transfer(local, &dest.absolute, provider.host(), reason);

        let source = tokio::fs::canonicalize(local)
            .await
            .map_err(|e| BenchError::source_unreadable(local, e))?;

        let parent = dest
            .absolute
            .parent()
            .ok_or_else(|| fail("destination has no parent directory".to_string()))?;
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| fail(format!("cannot create {}: {}", parent.display(), e)))?;

        // Link under a unique name, then rename over any stale or dangling link.
        let tmp = parent.join(format!(".staging-{}", uuid::Uuid::new_v4().simple()));
        symlink(&source, &tmp)
            .await
            .map_err(|e| fail(format!("symlink failed: {}", e)))?;

        if let Err(e) = tokio::fs::rename(&tmp, &dest.absolute).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(fail(format!("rename into place failed: {}", e)));
        }
        Ok(())
    }
}

#[cfg(unix)]
async fn symlink(source: &Path, link: &Path) -> std::io::Result<()> {
    tokio::fs::symlink(source, link).await
}

#[cfg(not(unix))]
async fn symlink(_source: &Path, _link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        ErrorKind::Unsupported,
        "symlink staging requires a unix host",
    ))
}
