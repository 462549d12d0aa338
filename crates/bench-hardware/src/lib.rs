//! Hardware side of the bench: GPIO resources and drivers, device matching,
//! declarative bench configuration, and the registry that binds it all.
//!
//! # Modules
//!
//! - [`gpio`]: GPIO line resources (static, network and USB-matched)
//! - [`matcher`]: device discovery for dynamically matched resources
//! - [`drivers`]: `gpioset`-backed digital output driver
//! - [`config`]: TOML bench description, schema and validation
//! - [`registry`]: builds resources and drivers from a bench description

pub mod config;
pub mod drivers;
pub mod gpio;
pub mod matcher;
pub mod registry;

pub use config::{load_bench_config, BenchConfig};
pub use drivers::{GpioTools, GpiodDigitalOutputDriver};
pub use gpio::{GpiodGpio, NetworkGpiodGpio, RawGpiodGpio, UsbGpiodGpio};
pub use matcher::{DeviceMatcher, DiscoveredDevice, MatchSpec, SysfsMatcher};
pub use registry::{
    BenchRegistry, DriverHandle, DriverInfo, RegistryOptions, ResourceHandle, ResourceInfo,
};
