//! Provider drivers: the [`FileStager`] capability for TFTP, HTTP and NFS.
//!
//! One driver type serves all three protocols. The flavor fixes which
//! provider kinds may be bound and how the result is presented to the
//! consumer; the bound provider's host picks the transport.

use crate::cache::{ContentCache, StagedFile};
use crate::paths::{compose_external, CacheLayout};
use crate::session::SessionManager;
use crate::transport::{LocalLink, RemoteCopy, SharedCache, Transport};
use async_trait::async_trait;
use bench_core::{
    Binding, BenchResult, Driver, DriverState, ExportVars, FileStager, Locator, NfsFile, Provider,
    ResourceKind,
};
use std::path::Path;
use std::sync::Arc;
use tracing::Instrument;

const TFTP_KINDS: &[ResourceKind] = &[ResourceKind::TftpProvider, ResourceKind::RemoteTftpProvider];
const HTTP_KINDS: &[ResourceKind] = &[ResourceKind::HttpProvider, ResourceKind::RemoteHttpProvider];
const NFS_KINDS: &[ResourceKind] = &[ResourceKind::NfsProvider, ResourceKind::RemoteNfsProvider];

/// Protocol served by a [`ProviderDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderFlavor {
    /// TFTP root; path locators
    Tftp,
    /// HTTP document root; URL locators
    Http,
    /// NFS-exported cache; [`NfsFile`] locators
    Nfs,
}

impl ProviderFlavor {
    /// Resource kinds this flavor may bind.
    pub fn accepts(&self) -> &'static [ResourceKind] {
        match self {
            Self::Tftp => TFTP_KINDS,
            Self::Http => HTTP_KINDS,
            Self::Nfs => NFS_KINDS,
        }
    }

    /// Driver type name used in bench configuration.
    pub fn driver_type(&self) -> &'static str {
        match self {
            Self::Tftp => "tftp_provider_driver",
            Self::Http => "http_provider_driver",
            Self::Nfs => "nfs_provider_driver",
        }
    }

    /// Layout used when staging to a remote host.
    fn remote_layout(&self) -> CacheLayout {
        match self {
            Self::Tftp | Self::Http => CacheLayout::Flat,
            Self::Nfs => CacheLayout::Keyed,
        }
    }
}

/// Stages local files onto a bound provider through a shared content cache.
pub struct ProviderDriver {
    flavor: ProviderFlavor,
    binding: Binding<dyn Provider>,
    cache: Arc<ContentCache>,
    sessions: Arc<dyn SessionManager>,
    transport: Option<Arc<dyn Transport>>,
}

impl ProviderDriver {
    /// Create an unbound driver.
    pub fn new(
        name: impl Into<String>,
        flavor: ProviderFlavor,
        cache: Arc<ContentCache>,
        sessions: Arc<dyn SessionManager>,
    ) -> Self {
        Self {
            flavor,
            binding: Binding::new(name, flavor.accepts()),
            cache,
            sessions,
            transport: None,
        }
    }

    /// Always stage through `transport` instead of choosing by host.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Protocol served by this driver.
    pub fn flavor(&self) -> ProviderFlavor {
        self.flavor
    }

    /// Attach `provider`. Fails with `BindingMismatch` for foreign kinds.
    pub fn bind(&self, provider: Arc<dyn Provider>) -> BenchResult<()> {
        self.binding.bind(provider)
    }

    /// Detach the provider, deactivating first if needed.
    pub fn unbind(&self) -> Option<Arc<dyn Provider>> {
        self.binding.unbind()
    }

    /// Transport used for `provider`.
    pub fn transport_for(&self, provider: &dyn Provider) -> Arc<dyn Transport> {
        if let Some(transport) = &self.transport {
            return transport.clone();
        }
        match (self.flavor, provider.is_local()) {
            (ProviderFlavor::Tftp | ProviderFlavor::Http, true) => Arc::new(LocalLink),
            (ProviderFlavor::Nfs, true) => Arc::new(SharedCache),
            (flavor, false) => Arc::new(RemoteCopy::new(
                self.sessions.clone(),
                flavor.remote_layout(),
            )),
        }
    }

    fn locator(&self, provider: &dyn Provider, staged: &StagedFile) -> BenchResult<Locator> {
        let relative = &staged.destination.relative;
        match self.flavor {
            ProviderFlavor::Tftp | ProviderFlavor::Http => {
                Ok(Locator::Path(compose_external(provider.external(), relative)))
            }
            ProviderFlavor::Nfs => {
                let host = if provider.is_local() {
                    hostname::get()?.to_string_lossy().into_owned()
                } else {
                    provider.host().to_string()
                };
                Ok(Locator::Nfs(NfsFile {
                    host,
                    export_root: provider.internal().display().to_string(),
                    relative_path: relative.clone(),
                }))
            }
        }
    }
}

#[async_trait]
impl FileStager for ProviderDriver {
    fn get_export_vars(&self) -> BenchResult<ExportVars> {
        Ok(self.binding.check_bound()?.export_vars())
    }

    async fn stage(&self, path: &Path) -> BenchResult<Locator> {
        let span = tracing::info_span!(
            "stage",
            driver = self.binding.driver_name(),
            file = %path.display()
        );

        async {
            let provider = self.binding.check_active()?;
            let transport = self.transport_for(provider.as_ref());
            let staged = self
                .cache
                .stage(path, provider.as_ref(), transport.as_ref())
                .await?;
            let locator = self.locator(provider.as_ref(), &staged)?;
            tracing::debug!(%locator, transferred = staged.transferred, "staged");
            Ok(locator)
        }
        .instrument(span)
        .await
    }
}

#[async_trait]
impl Driver for ProviderDriver {
    fn name(&self) -> &str {
        self.binding.driver_name()
    }

    fn accepts(&self) -> &'static [ResourceKind] {
        self.binding.accepts()
    }

    fn state(&self) -> DriverState {
        self.binding.state()
    }

    async fn activate(&self) -> BenchResult<()> {
        self.binding.activate()?;
        tracing::debug!(
            driver = self.binding.driver_name(),
            kind = self.flavor.driver_type(),
            "activated"
        );
        Ok(())
    }

    async fn deactivate(&self) -> BenchResult<()> {
        self.binding.deactivate();
        Ok(())
    }
}
