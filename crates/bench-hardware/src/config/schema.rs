//! Schema for declarative bench descriptions.
//!
//! # Schema Structure
//!
//! ```toml
//! [[resources]]      # One entry per resource, tagged by `kind`
//! [[drivers]]        # One entry per driver, tagged by `kind`, naming its resource
//! ```
//!
//! # Example
//!
//! ```toml
//! [[resources]]
//! kind = "remote_tftp_provider"
//! name = "tftp"
//! host = "exporter"
//! internal = "/srv/tftp"
//! external = "board/"
//!
//! [[resources]]
//! kind = "usb_gpiod_gpio"
//! name = "reset"
//! pin = 2
//! match = { "@ID_SERIAL_SHORT" = "A1B2" }
//!
//! [[drivers]]
//! kind = "tftp_provider_driver"
//! name = "tftp"
//! resource = "tftp"
//!
//! [[drivers]]
//! kind = "gpiod_digital_output_driver"
//! name = "reset"
//! resource = "reset"
//! ```

use crate::drivers::GPIO_KINDS;
use crate::matcher::MatchSpec;
use bench_core::ResourceKind;
use bench_staging::ProviderFlavor;
use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use std::path::PathBuf;

// =============================================================================
// Top-Level Config
// =============================================================================

/// Complete bench description loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Resources available on the bench
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,

    /// Drivers and the resource each one binds
    #[serde(default)]
    pub drivers: Vec<DriverConfig>,
}

// =============================================================================
// Resources
// =============================================================================

/// A local GPIO line (`gpiod_gpio`, `raw_gpiod_gpio`).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GpioConfig {
    /// Resource name
    #[validate(min_length = 1)]
    pub name: String,

    /// GPIO chip device (required for `raw_gpiod_gpio`)
    #[serde(default)]
    pub chip: Option<String>,

    /// Line offset on the chip
    #[serde(default)]
    pub pin: u32,
}

/// A GPIO line on an exporter host.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NetworkGpioConfig {
    /// Resource name
    #[validate(min_length = 1)]
    pub name: String,

    /// Host the line is attached to
    #[validate(min_length = 1)]
    pub host: String,

    /// GPIO chip device on that host
    #[validate(min_length = 1)]
    pub chip: String,

    /// Line offset on the chip
    pub pin: u32,
}

/// A GPIO line on a USB controller found by device matching.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UsbGpioConfig {
    /// Resource name
    #[validate(min_length = 1)]
    pub name: String,

    /// Line offset on the chip
    #[serde(default)]
    pub pin: u32,

    /// Extra match requirements (`@KEY` for ancestor properties)
    #[serde(default, rename = "match")]
    pub match_spec: MatchSpec,

    /// Ignored; the chip comes from the matched device
    #[serde(default)]
    pub chip: Option<String>,
}

/// A file-staging destination.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProviderConfig {
    /// Resource name
    #[validate(min_length = 1)]
    pub name: String,

    /// Provider host; empty for this machine
    #[serde(default)]
    pub host: String,

    /// Absolute root the staging mechanism writes below
    pub internal: PathBuf,

    /// Prefix a consumer uses to reach the same content
    #[serde(default)]
    pub external: String,
}

/// Resource entry, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceConfig {
    /// Local line with optional chip
    GpiodGpio(GpioConfig),
    /// Local line with mandatory chip
    RawGpiodGpio(GpioConfig),
    /// Line on a remote exporter
    NetworkGpiodGpio(NetworkGpioConfig),
    /// Line on a matched USB controller
    UsbGpiodGpio(UsbGpioConfig),
    /// Local TFTP root
    TftpProvider(ProviderConfig),
    /// TFTP root on a remote host
    RemoteTftpProvider(ProviderConfig),
    /// Local NFS-exported cache
    NfsProvider(ProviderConfig),
    /// NFS-exported cache on a remote host
    RemoteNfsProvider(ProviderConfig),
    /// Local HTTP document root
    HttpProvider(ProviderConfig),
    /// HTTP document root on a remote host
    RemoteHttpProvider(ProviderConfig),
}

impl ResourceConfig {
    /// Resource name.
    pub fn name(&self) -> &str {
        match self {
            Self::GpiodGpio(c) | Self::RawGpiodGpio(c) => &c.name,
            Self::NetworkGpiodGpio(c) => &c.name,
            Self::UsbGpiodGpio(c) => &c.name,
            Self::TftpProvider(c)
            | Self::RemoteTftpProvider(c)
            | Self::NfsProvider(c)
            | Self::RemoteNfsProvider(c)
            | Self::HttpProvider(c)
            | Self::RemoteHttpProvider(c) => &c.name,
        }
    }

    /// Resource kind.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::GpiodGpio(_) => ResourceKind::GpiodGpio,
            Self::RawGpiodGpio(_) => ResourceKind::RawGpiodGpio,
            Self::NetworkGpiodGpio(_) => ResourceKind::NetworkGpiodGpio,
            Self::UsbGpiodGpio(_) => ResourceKind::UsbGpiodGpio,
            Self::TftpProvider(_) => ResourceKind::TftpProvider,
            Self::RemoteTftpProvider(_) => ResourceKind::RemoteTftpProvider,
            Self::NfsProvider(_) => ResourceKind::NfsProvider,
            Self::RemoteNfsProvider(_) => ResourceKind::RemoteNfsProvider,
            Self::HttpProvider(_) => ResourceKind::HttpProvider,
            Self::RemoteHttpProvider(_) => ResourceKind::RemoteHttpProvider,
        }
    }

    /// Provider settings, for provider kinds.
    pub fn provider(&self) -> Option<&ProviderConfig> {
        match self {
            Self::TftpProvider(c)
            | Self::RemoteTftpProvider(c)
            | Self::NfsProvider(c)
            | Self::RemoteNfsProvider(c)
            | Self::HttpProvider(c)
            | Self::RemoteHttpProvider(c) => Some(c),
            _ => None,
        }
    }

    /// Field-level validation of the inner settings.
    pub fn validate_fields(&self) -> Result<(), serde_valid::validation::Errors> {
        match self {
            Self::GpiodGpio(c) | Self::RawGpiodGpio(c) => c.validate(),
            Self::NetworkGpiodGpio(c) => c.validate(),
            Self::UsbGpiodGpio(c) => c.validate(),
            Self::TftpProvider(c)
            | Self::RemoteTftpProvider(c)
            | Self::NfsProvider(c)
            | Self::RemoteNfsProvider(c)
            | Self::HttpProvider(c)
            | Self::RemoteHttpProvider(c) => c.validate(),
        }
    }
}

// =============================================================================
// Drivers
// =============================================================================

/// Driver instance and the resource it binds.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DriverBinding {
    /// Driver name
    #[validate(min_length = 1)]
    pub name: String,

    /// Name of the resource to bind
    #[validate(min_length = 1)]
    pub resource: String,
}

/// Driver entry, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriverConfig {
    /// Stage files on a TFTP provider
    TftpProviderDriver(DriverBinding),
    /// Stage files on an HTTP provider
    HttpProviderDriver(DriverBinding),
    /// Stage files on an NFS provider
    NfsProviderDriver(DriverBinding),
    /// Switch a GPIO line
    GpiodDigitalOutputDriver(DriverBinding),
}

impl DriverConfig {
    /// Name and bound resource.
    pub fn binding(&self) -> &DriverBinding {
        match self {
            Self::TftpProviderDriver(b)
            | Self::HttpProviderDriver(b)
            | Self::NfsProviderDriver(b)
            | Self::GpiodDigitalOutputDriver(b) => b,
        }
    }

    /// Driver name.
    pub fn name(&self) -> &str {
        &self.binding().name
    }

    /// Driver type name as written in configuration.
    pub fn driver_type(&self) -> &'static str {
        match self.flavor() {
            Some(flavor) => flavor.driver_type(),
            None => "gpiod_digital_output_driver",
        }
    }

    /// Staging flavor, for provider drivers.
    pub fn flavor(&self) -> Option<ProviderFlavor> {
        match self {
            Self::TftpProviderDriver(_) => Some(ProviderFlavor::Tftp),
            Self::HttpProviderDriver(_) => Some(ProviderFlavor::Http),
            Self::NfsProviderDriver(_) => Some(ProviderFlavor::Nfs),
            Self::GpiodDigitalOutputDriver(_) => None,
        }
    }

    /// Resource kinds this driver can bind.
    pub fn accepts(&self) -> &'static [ResourceKind] {
        match self.flavor() {
            Some(flavor) => flavor.accepts(),
            None => GPIO_KINDS,
        }
    }
}
