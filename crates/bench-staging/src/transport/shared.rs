//! NFS-style shared cache.
//!
//! Content is copied into a local cache directory keyed by fingerprint; an
//! NFS export of that directory makes it visible to the device under test.
//! The copy always happens, even when the source is already on an exported
//! filesystem, so the authoritative cache entry exists regardless of where
//! the source lives.

use super::Transport;
use crate::paths::{CacheLayout, StagePath};
use async_trait::async_trait;
use bench_core::{BenchError, BenchResult, Provider};
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

/// Stage by copying into a local, exported cache root.
#[derive(Debug, Clone, Copy, Default)]
pub struct SharedCache;

#[async_trait]
impl Transport for SharedCache {
    fn name(&self) -> &'static str {
        "shared_cache"
    }

    fn layout(&self) -> CacheLayout {
        CacheLayout::Keyed
    }

    async fn exists(&self, dest: &StagePath, provider: &dyn Provider) -> BenchResult<bool> {
        match tokio::fs::metadata(&dest.absolute).await {
            Ok(meta) if meta.is_file() => Ok(true),
            Ok(_) => Err(BenchError::transfer(
                "",
                &dest.absolute,
                provider.host(),
                "destination is blocked by a non-file entry",
            )),
            // Includes a dangling link, which the rename in `copy` replaces.
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BenchError::transfer(
                "",
                &dest.absolute,
                provider.host(),
                format!("stat failed: {}", e),
            )),
        }
    }

    async fn copy(
        &self,
        local: &Path,
        dest: &StagePath,
        provider: &dyn Provider,
    ) -> BenchResult<()> {
        let local_owned = local.to_path_buf();
        let target = dest.absolute.clone();

        let result = tokio::task::spawn_blocking(move || write_atomically(&local_owned, &target))
            .await
            .map_err(|e| format!("copy task failed: {}", e))
            .and_then(|r| r);

        result.map_err(|reason| BenchError::transfer(local, &dest.absolute, provider.host(), reason))
    }
}

/// Copy `source` to a temporary file next to `target`, then rename it into
/// place so readers never observe a partial file.
fn write_atomically(source: &Path, target: &Path) -> Result<(), String> {
    let parent = target
        .parent()
        .ok_or_else(|| format!("{} has no parent directory", target.display()))?;
    std::fs::create_dir_all(parent)
        .map_err(|e| format!("cannot create {}: {}", parent.display(), e))?;

    let mut input =
        File::open(source).map_err(|e| format!("cannot open {}: {}", source.display(), e))?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".staging-")
        .tempfile_in(parent)
        .map_err(|e| format!("cannot create temporary file: {}", e))?;

    std::io::copy(&mut input, tmp.as_file_mut()).map_err(|e| format!("copy failed: {}", e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| format!("sync failed: {}", e))?;

    // Temporary files are created 0600; exported content must be world-readable.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .map_err(|e| format!("chmod failed: {}", e))?;
    }

    tmp.persist(target)
        .map_err(|e| format!("rename into place failed: {}", e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::confine;
    use crate::provider::ProviderResource;
    use bench_core::ResourceKind;

    #[tokio::test]
    async fn test_copy_is_a_snapshot() {
        let src_dir = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("rootfs.ext4");
        std::fs::write(&source, b"ABC").unwrap();

        let provider =
            ProviderResource::local("nfs", ResourceKind::NfsProvider, root.path(), "").unwrap();
        let dest = confine(root.path(), "fp/rootfs.ext4").unwrap();

        assert!(!SharedCache.exists(&dest, &provider).await.unwrap());
        SharedCache.copy(&source, &dest, &provider).await.unwrap();
        assert!(SharedCache.exists(&dest, &provider).await.unwrap());

        std::fs::write(&source, b"changed").unwrap();
        assert_eq!(std::fs::read(&dest.absolute).unwrap(), b"ABC");
    }

    #[tokio::test]
    async fn test_recopy_leaves_no_temporaries() {
        let src_dir = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("rootfs.ext4");
        std::fs::write(&source, b"ABC").unwrap();

        let provider =
            ProviderResource::local("nfs", ResourceKind::NfsProvider, root.path(), "").unwrap();
        let dest = confine(root.path(), "fp/rootfs.ext4").unwrap();

        SharedCache.copy(&source, &dest, &provider).await.unwrap();
        SharedCache.copy(&source, &dest, &provider).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(root.path().join("fp"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("rootfs.ext4")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_copied_file_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let src_dir = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("kernel");
        std::fs::write(&source, b"k").unwrap();

        let provider =
            ProviderResource::local("nfs", ResourceKind::NfsProvider, root.path(), "").unwrap();
        let dest = confine(root.path(), "fp/kernel").unwrap();
        SharedCache.copy(&source, &dest, &provider).await.unwrap();

        let mode = std::fs::metadata(&dest.absolute).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[tokio::test]
    async fn test_missing_source_is_transfer_error() {
        let root = tempfile::tempdir().unwrap();
        let provider =
            ProviderResource::local("nfs", ResourceKind::NfsProvider, root.path(), "").unwrap();
        let dest = confine(root.path(), "fp/missing").unwrap();
        let err = SharedCache
            .copy(Path::new("/nonexistent/missing"), &dest, &provider)
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::Transfer { .. }));
    }

    #[tokio::test]
    async fn test_non_file_destination_is_named() {
        let root = tempfile::tempdir().unwrap();
        let provider =
            ProviderResource::local("nfs", ResourceKind::NfsProvider, root.path(), "").unwrap();
        let dest = confine(root.path(), "fp/rootfs.ext4").unwrap();
        std::fs::create_dir_all(&dest.absolute).unwrap();

        match SharedCache.exists(&dest, &provider).await.unwrap_err() {
            BenchError::Transfer { destination, reason, .. } => {
                assert_eq!(destination, dest.absolute);
                assert!(reason.contains("non-file"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_entry_is_replaced() {
        let src_dir = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("rootfs.ext4");
        std::fs::write(&source, b"ABC").unwrap();

        let provider =
            ProviderResource::local("nfs", ResourceKind::NfsProvider, root.path(), "").unwrap();
        let dest = confine(root.path(), "fp/rootfs.ext4").unwrap();
        std::fs::create_dir_all(root.path().join("fp")).unwrap();
        std::os::unix::fs::symlink(root.path().join("gone"), &dest.absolute).unwrap();

        assert!(!SharedCache.exists(&dest, &provider).await.unwrap());
        SharedCache.copy(&source, &dest, &provider).await.unwrap();
        assert_eq!(std::fs::read(&dest.absolute).unwrap(), b"ABC");
    }
}
