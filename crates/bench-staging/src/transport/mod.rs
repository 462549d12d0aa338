//! Transport backends.
//!
//! A transport answers two questions for a validated [`StagePath`]: does the
//! destination already exist, and how is a local file copied there.
//!
//! | Backend | `exists` | `copy` |
//! |---------|----------|--------|
//! | [`LocalLink`] | local stat through the link (dangling = absent) | temp symlink to the source, renamed over the destination |
//! | [`RemoteCopy`] | `test -e` over a remote session | `mkdir -p`, upload to temp, `mv -f` |
//! | [`SharedCache`] | local `stat` (non-file entry = error) | copy to temp in the cache, rename |
//!
//! `copy` must be idempotent: two callers racing on the same destination may
//! both copy, and neither may expose a partially written file.

mod local;
mod remote;
mod shared;

pub use local::LocalLink;
pub use remote::RemoteCopy;
pub use shared::SharedCache;

use crate::paths::{CacheLayout, StagePath};
use async_trait::async_trait;
use bench_core::{BenchResult, Provider};
use std::path::Path;

/// Strategy that makes a file available at a provider destination.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short backend name for logs and cache bookkeeping.
    fn name(&self) -> &'static str;

    /// How fingerprints and names map to cache-relative paths.
    fn layout(&self) -> CacheLayout;

    /// Whether `dest` already holds staged content.
    async fn exists(&self, dest: &StagePath, provider: &dyn Provider) -> BenchResult<bool>;

    /// Copy `local` to `dest`. Fails with `BenchError::Transfer`.
    async fn copy(&self, local: &Path, dest: &StagePath, provider: &dyn Provider)
        -> BenchResult<()>;
}
