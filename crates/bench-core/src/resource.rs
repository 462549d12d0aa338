//! Resource descriptions and the capability contracts drivers bind against.
//!
//! A resource is immutable after construction except for fields owned by a
//! dynamic matcher (e.g. the chip path of a USB GPIO controller), which are
//! refreshed through [`Resource::update`].
//!
//! Drivers do not care about the concrete resource type. A staging driver binds
//! anything that implements [`Provider`]; a GPIO driver binds anything that
//! implements [`GpioLine`]. The accepted set of [`ResourceKind`]s is checked at
//! bind time.

use crate::error::BenchResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// =============================================================================
// Resource Kinds
// =============================================================================

/// Every concrete resource variant known to the bench.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Local GPIO line with an optional chip
    GpiodGpio,
    /// Local GPIO line that must name its chip
    RawGpiodGpio,
    /// GPIO line on a remote exporter host
    NetworkGpiodGpio,
    /// GPIO line on a USB GPIO controller found by device matching
    UsbGpiodGpio,
    /// Local TFTP root
    TftpProvider,
    /// TFTP root on a remote host
    RemoteTftpProvider,
    /// Local NFS-exported cache
    NfsProvider,
    /// NFS-exported cache on a remote host
    RemoteNfsProvider,
    /// Local HTTP document root
    HttpProvider,
    /// HTTP document root on a remote host
    RemoteHttpProvider,
}

impl ResourceKind {
    /// Configuration name (matches the serde representation).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GpiodGpio => "gpiod_gpio",
            Self::RawGpiodGpio => "raw_gpiod_gpio",
            Self::NetworkGpiodGpio => "network_gpiod_gpio",
            Self::UsbGpiodGpio => "usb_gpiod_gpio",
            Self::TftpProvider => "tftp_provider",
            Self::RemoteTftpProvider => "remote_tftp_provider",
            Self::NfsProvider => "nfs_provider",
            Self::RemoteNfsProvider => "remote_nfs_provider",
            Self::HttpProvider => "http_provider",
            Self::RemoteHttpProvider => "remote_http_provider",
        }
    }

    /// Whether this kind describes a file-staging destination.
    pub fn is_provider(&self) -> bool {
        matches!(
            self,
            Self::TftpProvider
                | Self::RemoteTftpProvider
                | Self::NfsProvider
                | Self::RemoteNfsProvider
                | Self::HttpProvider
                | Self::RemoteHttpProvider
        )
    }

    /// Whether this kind lives on a remote host.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::NetworkGpiodGpio
                | Self::RemoteTftpProvider
                | Self::RemoteNfsProvider
                | Self::RemoteHttpProvider
        )
    }

    /// Render a kind set as a comma-separated list for messages.
    pub fn join(kinds: &[ResourceKind]) -> String {
        kinds
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `host` refers to this machine.
pub fn is_local_host(host: &str) -> bool {
    matches!(host, "" | "localhost" | "127.0.0.1" | "::1")
}

// =============================================================================
// Resource Contracts
// =============================================================================

/// A configured, controllable endpoint.
///
/// Resource lifetime is owned by the bench (configuration/session); drivers
/// only hold shared references.
pub trait Resource: Send + Sync + fmt::Debug {
    /// Unique name within the bench.
    fn name(&self) -> &str;

    /// Concrete variant of this resource.
    fn kind(&self) -> ResourceKind;

    /// Whether the resource currently has everything needed for I/O.
    ///
    /// Static resources are always available.
    fn avail(&self) -> bool {
        true
    }

    /// Refresh matcher-owned fields.
    ///
    /// Idempotent. Static resources have nothing to refresh.
    fn update(&self) -> BenchResult<()> {
        Ok(())
    }
}

/// A file-staging destination: host, internal root and external root.
pub trait Provider: Resource {
    /// Remote endpoint, or empty for this machine.
    fn host(&self) -> &str;

    /// Absolute root as seen by the staging mechanism.
    fn internal(&self) -> &Path;

    /// Path or URL prefix a consumer uses to reach the same content.
    fn external(&self) -> &str;

    /// Stable identity used as part of the content cache key.
    fn identity(&self) -> String {
        format!("{}:{}:{}", self.kind(), self.host(), self.internal().display())
    }

    /// Whether staging happens on this machine.
    fn is_local(&self) -> bool {
        is_local_host(self.host())
    }

    /// Read-only snapshot of the provider configuration.
    fn export_vars(&self) -> ExportVars {
        ExportVars {
            host: self.host().to_string(),
            internal: self.internal().display().to_string(),
            external: self.external().to_string(),
        }
    }
}

/// A single GPIO line on a gpiod chip.
pub trait GpioLine: Resource {
    /// Chip device path, or `None` while a dynamic resource is unmatched.
    fn chip(&self) -> Option<String>;

    /// Line offset on the chip.
    fn pin(&self) -> u32;

    /// Host commands must be executed on, for network lines.
    fn host(&self) -> Option<&str> {
        None
    }
}

/// Export variables of a bound provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportVars {
    /// Provider host (empty for local providers)
    pub host: String,
    /// Internal root path
    pub internal: String,
    /// External path or URL prefix
    pub external: String,
}
