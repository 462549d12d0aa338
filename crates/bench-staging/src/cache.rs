//! Content cache: at most one transfer per (fingerprint, provider).
//!
//! # Algorithm
//!
//! ```text
//! stage(local, provider, transport)
//!   name  = final component of local          ── PathViolation if none
//!   fp    = sha256(local)                     ── SourceUnreadable
//!   rel   = layout(fp, name)
//!   dest  = confine(provider.internal, rel)   ── PathViolation (before any mutation)
//!   if entry(fp, provider) verified within verify_interval → reuse
//!   else if transport.exists(dest)                         → reuse
//!   else transport.copy(local, dest)                       ── TransferError
//!   record entry(fp, provider)
//! ```
//!
//! The existence check is an optimisation, not a lock: two callers may both
//! see "absent" and both copy. Transports make `copy` idempotent and never
//! expose partial files, so the race is harmless.
//!
//! Entries are never evicted from the remote side by this layer; stale cache
//! files are left to external housekeeping.

use crate::fingerprint::{fingerprint_file, Fingerprint};
use crate::paths::{confine, staged_name, StagePath};
use crate::transport::Transport;
use bench_core::{BenchError, BenchResult, Provider};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Result of a single stage request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Content fingerprint of the local file
    pub fingerprint: Fingerprint,
    /// Destination below the provider root
    pub destination: StagePath,
    /// Whether this request copied data (false on cache hits)
    pub transferred: bool,
}

/// Bookkeeping for one (fingerprint, provider) pair.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    /// Hex content fingerprint
    pub fingerprint: String,
    /// Provider identity (`kind:host:internal`)
    pub provider: String,
    /// Most recent local file staged with this content
    pub local_path: PathBuf,
    /// Cache-relative destination
    pub relative_path: String,
    /// Transport that materialised the copy
    pub transport: &'static str,
    /// When the destination was last confirmed present
    pub verified_at: DateTime<Utc>,
    /// Copies performed by this process
    pub transfers: u64,
}

type CacheKey = (Fingerprint, String);

/// Tracks which content has already been materialised on which provider.
pub struct ContentCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    verify_interval: Duration,
}

impl ContentCache {
    /// Cache that re-verifies remote existence on every request.
    pub fn new() -> Self {
        Self::with_verify_interval(Duration::ZERO)
    }

    /// Cache that trusts a verified entry for `verify_interval`.
    pub fn with_verify_interval(verify_interval: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            verify_interval,
        }
    }

    /// Stage `local` on `provider` through `transport`.
    pub async fn stage(
        &self,
        local: &Path,
        provider: &dyn Provider,
        transport: &dyn Transport,
    ) -> BenchResult<StagedFile> {
        let name = staged_name(local).map_err(|_| BenchError::PathViolation {
            root: provider.internal().to_path_buf(),
            path: local.to_path_buf(),
        })?;

        let meta = tokio::fs::metadata(local)
            .await
            .map_err(|e| BenchError::source_unreadable(local, e))?;
        if !meta.is_file() {
            return Err(BenchError::source_unreadable(local, "not a regular file"));
        }

        let fingerprint = fingerprint_file(local).await?;
        let relative = transport.layout().relative_path(&fingerprint, &name);
        let destination = confine(provider.internal(), &relative)?;
        let key: CacheKey = (fingerprint.clone(), provider.identity());

        if self.is_fresh(&key) {
            tracing::debug!(
                fingerprint = fingerprint.short(),
                dest = %destination.absolute.display(),
                "recently verified, reusing"
            );
            self.record(key, local, &destination, transport.name(), false, false);
            return Ok(StagedFile {
                fingerprint,
                destination,
                transferred: false,
            });
        }

        let transferred = if transport.exists(&destination, provider).await? {
            tracing::debug!(
                fingerprint = fingerprint.short(),
                dest = %destination.absolute.display(),
                "already staged, skipping transfer"
            );
            false
        } else {
            tracing::info!(
                fingerprint = fingerprint.short(),
                local = %local.display(),
                dest = %destination.absolute.display(),
                transport = transport.name(),
                "transferring"
            );
            transport.copy(local, &destination, provider).await?;
            true
        };

        self.record(key, local, &destination, transport.name(), true, transferred);
        Ok(StagedFile {
            fingerprint,
            destination,
            transferred,
        })
    }

    /// Snapshot of all entries, sorted by fingerprint.
    pub fn entries(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = self.entries.lock().values().cloned().collect();
        entries.sort_by(|a, b| {
            a.fingerprint
                .cmp(&b.fingerprint)
                .then_with(|| a.provider.cmp(&b.provider))
        });
        entries
    }

    /// Drop bookkeeping for `fingerprint` on every provider.
    ///
    /// Remote copies are left untouched.
    pub fn forget(&self, fingerprint: &Fingerprint) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(fp, _), _| fp != fingerprint);
        before - entries.len()
    }

    fn is_fresh(&self, key: &CacheKey) -> bool {
        if self.verify_interval.is_zero() {
            return false;
        }
        let Some(entry) = self.entries.lock().get(key).map(|e| e.verified_at) else {
            return false;
        };
        match (Utc::now() - entry).to_std() {
            Ok(age) => age < self.verify_interval,
            // verified_at in the future: clock went backwards, re-verify
            Err(_) => false,
        }
    }

    /// Update bookkeeping. `verified` means the destination was just
    /// confirmed present (by an existence check or a completed copy).
    fn record(
        &self,
        key: CacheKey,
        local: &Path,
        destination: &StagePath,
        transport: &'static str,
        verified: bool,
        transferred: bool,
    ) {
        let now = Utc::now();
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.clone()).or_insert_with(|| CacheEntry {
            fingerprint: key.0.to_string(),
            provider: key.1.clone(),
            local_path: local.to_path_buf(),
            relative_path: destination.relative.clone(),
            transport,
            verified_at: now,
            transfers: 0,
        });
        entry.local_path = local.to_path_buf();
        entry.transport = transport;
        if verified {
            entry.verified_at = now;
        }
        if transferred {
            entry.transfers += 1;
        }
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::CacheLayout;
    use crate::provider::ProviderResource;
    use async_trait::async_trait;
    use bench_core::ResourceKind;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory destination set that counts calls.
    #[derive(Default)]
    struct CountingTransport {
        present: Mutex<HashSet<PathBuf>>,
        exists_calls: AtomicUsize,
        copies: AtomicUsize,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn layout(&self) -> CacheLayout {
            CacheLayout::Flat
        }

        async fn exists(&self, dest: &StagePath, _provider: &dyn Provider) -> BenchResult<bool> {
            self.exists_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.present.lock().contains(&dest.absolute))
        }

        async fn copy(
            &self,
            _local: &Path,
            dest: &StagePath,
            _provider: &dyn Provider,
        ) -> BenchResult<()> {
            self.copies.fetch_add(1, Ordering::SeqCst);
            self.present.lock().insert(dest.absolute.clone());
            Ok(())
        }
    }

    fn provider(internal: &str) -> ProviderResource {
        ProviderResource::remote(
            "tftp",
            ResourceKind::RemoteTftpProvider,
            "exporter",
            internal,
            "",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_second_stage_does_not_copy() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("image.bin");
        std::fs::write(&local, b"ABC").unwrap();

        let cache = ContentCache::new();
        let transport = CountingTransport::default();
        let provider = provider("/srv/tftp");

        let first = cache.stage(&local, &provider, &transport).await.unwrap();
        let second = cache.stage(&local, &provider, &transport).await.unwrap();

        assert!(first.transferred);
        assert!(!second.transferred);
        assert_eq!(first.destination, second.destination);
        assert_eq!(transport.copies.load(Ordering::SeqCst), 1);
        assert_eq!(transport.exists_calls.load(Ordering::SeqCst), 2);

        let entries = cache.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].transfers, 1);
        assert_eq!(entries[0].provider, provider.identity());
    }

    #[tokio::test]
    async fn test_changed_content_is_copied_again() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("image.bin");
        let cache = ContentCache::new();
        let transport = CountingTransport::default();
        let provider = provider("/srv/tftp");

        std::fs::write(&local, b"ABC").unwrap();
        let a = cache.stage(&local, &provider, &transport).await.unwrap();
        std::fs::write(&local, b"ABD").unwrap();
        let b = cache.stage(&local, &provider, &transport).await.unwrap();

        assert_ne!(a.fingerprint, b.fingerprint);
        assert_ne!(a.destination.absolute, b.destination.absolute);
        assert!(b.transferred);
        assert_eq!(transport.copies.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_same_content_on_two_providers() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("image.bin");
        std::fs::write(&local, b"ABC").unwrap();

        let cache = ContentCache::new();
        let transport = CountingTransport::default();

        cache.stage(&local, &provider("/srv/a"), &transport).await.unwrap();
        cache.stage(&local, &provider("/srv/b"), &transport).await.unwrap();

        assert_eq!(transport.copies.load(Ordering::SeqCst), 2);
        assert_eq!(cache.entries().len(), 2);
    }

    #[tokio::test]
    async fn test_verify_interval_skips_existence_check() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("image.bin");
        std::fs::write(&local, b"ABC").unwrap();

        let cache = ContentCache::with_verify_interval(Duration::from_secs(3600));
        let transport = CountingTransport::default();
        let provider = provider("/srv/tftp");

        cache.stage(&local, &provider, &transport).await.unwrap();
        let again = cache.stage(&local, &provider, &transport).await.unwrap();

        assert!(!again.transferred);
        assert_eq!(transport.exists_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_forget_forces_existence_check() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("image.bin");
        std::fs::write(&local, b"ABC").unwrap();

        let cache = ContentCache::with_verify_interval(Duration::from_secs(3600));
        let transport = CountingTransport::default();
        let provider = provider("/srv/tftp");

        let staged = cache.stage(&local, &provider, &transport).await.unwrap();
        assert_eq!(cache.forget(&staged.fingerprint), 1);
        assert!(cache.entries().is_empty());

        cache.stage(&local, &provider, &transport).await.unwrap();
        assert_eq!(transport.exists_calls.load(Ordering::SeqCst), 2);
        assert_eq!(transport.copies.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreadable_source_touches_nothing() {
        let cache = ContentCache::new();
        let transport = CountingTransport::default();

        let err = cache
            .stage(Path::new("/nonexistent/image.bin"), &provider("/srv/tftp"), &transport)
            .await
            .unwrap_err();

        assert!(matches!(err, BenchError::SourceUnreadable { .. }));
        assert_eq!(transport.exists_calls.load(Ordering::SeqCst), 0);
        assert!(cache.entries().is_empty());
    }

    #[tokio::test]
    async fn test_directory_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new();
        let transport = CountingTransport::default();

        let err = cache
            .stage(dir.path(), &provider("/srv/tftp"), &transport)
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::SourceUnreadable { .. }));
    }
}
