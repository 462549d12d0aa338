//! Declarative bench description.
//!
//! A bench is described in TOML as a list of resources and a list of drivers,
//! each tagged by `kind`. Every driver names the resource it binds.
//!
//! # Architecture
//!
//! 1. **Schema** - Rust types for resource and driver entries ([`schema`])
//! 2. **Loader** - figment-based loading plus cross-entry validation ([`loader`])
//!
//! Validation reports every problem at once (duplicate names, unknown
//! resource references, driver/resource kind mismatches, missing chips,
//! relative provider roots) rather than stopping at the first.

pub mod loader;
pub mod schema;

pub use loader::{
    default_bench_path, load_bench_config, load_bench_config_from_str, validate_bench_config,
    ConfigLoadError,
};
pub use schema::{
    BenchConfig, DriverBinding, DriverConfig, GpioConfig, NetworkGpioConfig, ProviderConfig,
    ResourceConfig, UsbGpioConfig,
};
