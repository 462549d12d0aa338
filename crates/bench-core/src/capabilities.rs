//! Capability traits implemented by bench drivers.
//!
//! Callers program against these traits instead of concrete drivers:
//!
//! - [`FileStager`]: make a local file reachable from the device under test
//! - [`DigitalOutput`]: drive a single digital line
//!
//! Each capability trait is async (`#[async_trait]`), `Send + Sync`, and
//! returns [`BenchResult`].

use crate::error::BenchResult;
use crate::resource::ExportVars;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// =============================================================================
// Locators
// =============================================================================

/// Mount information for a file staged into an NFS-exported cache.
///
/// NFS consumers mount `host:export_root` themselves and then open
/// `relative_path` below the mount point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NfsFile {
    /// Host exporting the cache
    pub host: String,
    /// Exported directory
    pub export_root: String,
    /// File path relative to `export_root`
    pub relative_path: String,
}

/// Value returned by staging that lets a remote consumer reach the content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Locator {
    /// `provider.external` joined with the cache-relative path
    Path(String),
    /// Structured NFS mount descriptor
    Nfs(NfsFile),
}

impl Locator {
    /// The string form, for path/URL locators.
    pub fn as_path(&self) -> Option<&str> {
        match self {
            Self::Path(p) => Some(p),
            Self::Nfs(_) => None,
        }
    }

    /// The NFS descriptor, for NFS locators.
    pub fn as_nfs(&self) -> Option<&NfsFile> {
        match self {
            Self::Path(_) => None,
            Self::Nfs(f) => Some(f),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => f.write_str(p),
            Self::Nfs(nfs) => write!(
                f,
                "{}:{} {}",
                nfs.host, nfs.export_root, nfs.relative_path
            ),
        }
    }
}

// =============================================================================
// Capability Traits
// =============================================================================

/// Capability: FileStager
///
/// Makes a local file available at a location the device under test can
/// reach, avoiding redundant transfers of identical content.
///
/// # Contract
/// - `get_export_vars()` requires only a bound provider.
/// - `stage()` requires an active driver.
/// - Staging the same bytes twice returns the same locator and performs no
///   second transfer.
#[async_trait]
pub trait FileStager: Send + Sync {
    /// Read-only snapshot of the bound provider's configuration.
    fn get_export_vars(&self) -> BenchResult<ExportVars>;

    /// Stage `path` and return the locator for the staged copy.
    async fn stage(&self, path: &Path) -> BenchResult<Locator>;
}

/// Capability: DigitalOutput
///
/// A single digital line that can be driven high or low.
#[async_trait]
pub trait DigitalOutput: Send + Sync {
    /// Drive the line (`true` = 1, `false` = 0).
    async fn set(&self, status: bool) -> BenchResult<()>;

    /// Read the line state back.
    async fn get(&self) -> BenchResult<bool>;
}
