//! Content fingerprints.
//!
//! A fingerprint is the lowercase hex SHA-256 digest of a file's bytes. It is
//! stable across machines and re-runs, so independent processes staging the
//! same content converge on the same destination path.

use bench_core::{BenchError, BenchResult};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const CHUNK_SIZE: usize = 64 * 1024;

/// Hex-encoded SHA-256 digest of a file's contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Full 64-character hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated digest for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash everything readable from `reader`.
pub fn fingerprint_reader<R: Read>(mut reader: R) -> std::io::Result<Fingerprint> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Fingerprint(format!("{:x}", hasher.finalize())))
}

/// Fingerprint the file at `path` on a blocking worker thread.
///
/// Fails with [`BenchError::SourceUnreadable`] if the file cannot be opened
/// or read.
pub async fn fingerprint_file(path: &Path) -> BenchResult<Fingerprint> {
    let owned: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let file = File::open(&owned).map_err(|e| BenchError::source_unreadable(&owned, e))?;
        fingerprint_reader(file).map_err(|e| BenchError::source_unreadable(&owned, e))
    })
    .await
    .map_err(|e| BenchError::source_unreadable(path, format!("hashing task failed: {}", e)))?
}
