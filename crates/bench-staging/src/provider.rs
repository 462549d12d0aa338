//! Provider resources: file-staging destinations.

use bench_core::{BenchError, BenchResult, Provider, Resource, ResourceKind};
use std::path::{Path, PathBuf};

/// A TFTP, HTTP or NFS staging destination, local or on a remote host.
///
/// All provider kinds share one shape; drivers distinguish them by
/// [`ResourceKind`] at bind time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResource {
    name: String,
    kind: ResourceKind,
    host: String,
    internal: PathBuf,
    external: String,
}

impl ProviderResource {
    /// Validate and build a provider.
    ///
    /// `internal` must be absolute. Remote kinds need a host.
    pub fn new(
        name: impl Into<String>,
        kind: ResourceKind,
        host: impl Into<String>,
        internal: impl Into<PathBuf>,
        external: impl Into<String>,
    ) -> BenchResult<Self> {
        let name = name.into();
        let host = host.into();
        let internal = internal.into();

        if !kind.is_provider() {
            return Err(BenchError::Configuration(format!(
                "resource '{}': kind '{}' is not a provider",
                name, kind
            )));
        }
        if internal.as_os_str().is_empty() || !internal.is_absolute() {
            return Err(BenchError::Configuration(format!(
                "provider '{}': internal path '{}' must be absolute",
                name,
                internal.display()
            )));
        }
        if kind.is_remote() && host.is_empty() {
            return Err(BenchError::Configuration(format!(
                "provider '{}': kind '{}' requires a host",
                name, kind
            )));
        }

        Ok(Self {
            name,
            kind,
            host,
            internal,
            external: external.into(),
        })
    }

    /// Provider on this machine.
    pub fn local(
        name: impl Into<String>,
        kind: ResourceKind,
        internal: impl Into<PathBuf>,
        external: impl Into<String>,
    ) -> BenchResult<Self> {
        Self::new(name, kind, "", internal, external)
    }

    /// Provider on `host`.
    pub fn remote(
        name: impl Into<String>,
        kind: ResourceKind,
        host: impl Into<String>,
        internal: impl Into<PathBuf>,
        external: impl Into<String>,
    ) -> BenchResult<Self> {
        Self::new(name, kind, host, internal, external)
    }
}

impl Resource for ProviderResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl Provider for ProviderResource {
    fn host(&self) -> &str {
        &self.host
    }

    fn internal(&self) -> &Path {
        &self.internal
    }

    fn external(&self) -> &str {
        &self.external
    }
}
