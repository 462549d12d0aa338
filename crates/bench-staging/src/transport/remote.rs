//! Remote copy over an ssh-style session.

use super::Transport;
use crate::paths::{CacheLayout, StagePath};
use crate::session::{shell_quote, RemoteSession, SessionManager};
use async_trait::async_trait;
use bench_core::{BenchError, BenchResult, Provider};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Stage by pushing bytes to the provider host.
///
/// `copy` creates the parent directory, uploads to a unique temporary name
/// and renames it into place. Either every step succeeds or the operation is
/// reported failed; a failed upload or rename removes the temporary file.
pub struct RemoteCopy {
    sessions: Arc<dyn SessionManager>,
    layout: CacheLayout,
}

impl RemoteCopy {
    /// Remote copy using `sessions` and cache `layout`.
    pub fn new(sessions: Arc<dyn SessionManager>, layout: CacheLayout) -> Self {
        Self { sessions, layout }
    }
}

#[async_trait]
impl Transport for RemoteCopy {
    fn name(&self) -> &'static str {
        "remote_copy"
    }

    fn layout(&self) -> CacheLayout {
        self.layout
    }

    async fn exists(&self, dest: &StagePath, provider: &dyn Provider) -> BenchResult<bool> {
        let fail = |reason: String| BenchError::transfer("", &dest.absolute, provider.host(), reason);

        let session = self.sessions.open(provider.host())?;
        let target = shell_quote(&dest.absolute.to_string_lossy());
        let lines = session
            .run_check(&format!("test -e {} && echo present || echo absent", target))
            .await
            .map_err(|e| fail(format!("existence check failed: {}", e)))?;

        Ok(lines.iter().any(|line| line.trim() == "present"))
    }

    async fn copy(
        &self,
        local: &Path,
        dest: &StagePath,
        provider: &dyn Provider,
    ) -> BenchResult<()> {
        let fail = |reason: String| BenchError::transfer(local, &dest.absolute, provider.host(), reason);

        let session = self.sessions.open(provider.host())?;

        if let Some(parent) = dest.absolute.parent() {
            session
                .run_check(&format!("mkdir -p {}", shell_quote(&parent.to_string_lossy())))
                .await
                .map_err(|e| fail(format!("cannot create parent directory: {}", e)))?;
        }

        let tmp = PathBuf::from(format!(
            "{}.part-{}",
            dest.absolute.display(),
            uuid::Uuid::new_v4().simple()
        ));
        if let Err(e) = session.put_file(local, &tmp).await {
            discard(session.as_ref(), &tmp).await;
            return Err(fail(format!("upload failed: {}", e)));
        }

        let rename = format!(
            "mv -f {} {}",
            shell_quote(&tmp.to_string_lossy()),
            shell_quote(&dest.absolute.to_string_lossy())
        );
        if let Err(e) = session.run_check(&rename).await {
            discard(session.as_ref(), &tmp).await;
            return Err(fail(format!("rename into place failed: {}", e)));
        }

        Ok(())
    }
}

/// Best-effort removal of a temporary upload.
async fn discard(session: &dyn RemoteSession, tmp: &Path) {
    let command = format!("rm -f {}", shell_quote(&tmp.to_string_lossy()));
    if let Err(e) = session.run_check(&command).await {
        tracing::warn!(
            host = session.host(),
            tmp = %tmp.display(),
            error = %e,
            "could not remove temporary upload"
        );
    }
}
