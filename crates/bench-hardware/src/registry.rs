//! Bench registry: resources and drivers built from a [`BenchConfig`].
//!
//! The registry owns every resource (drivers only hold `Arc`s handed out
//! here), binds each driver to the resource its configuration names, and
//! walks drivers through activation. Activating a driver first refreshes
//! its resource, so dynamically matched devices are looked up at the moment
//! they are needed.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = load_bench_config(Path::new("bench.toml"))?;
//! let registry = BenchRegistry::from_config(&config, RegistryOptions::default())?;
//!
//! registry.activate("tftp").await?;
//! let stager = registry.get_stager("tftp").unwrap();
//! let locator = stager.stage(Path::new("images/zImage")).await?;
//! ```

use crate::config::{validate_bench_config, BenchConfig, DriverConfig, ResourceConfig};
use crate::drivers::{GpioTools, GpiodDigitalOutputDriver};
use crate::gpio::{GpiodGpio, NetworkGpiodGpio, RawGpiodGpio, UsbGpiodGpio};
use crate::matcher::{DeviceMatcher, SysfsMatcher};
use bench_core::{
    BenchError, BenchResult, CommandRunner, DigitalOutput, Driver, DriverState, FileStager,
    GpioLine, ProcessRunner, Provider, Resource, ResourceKind,
};
use bench_staging::{
    ContentCache, ProviderDriver, ProviderResource, SessionManager, SshConfig, SshManager,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Collaborators and tunables used while building a registry.
pub struct RegistryOptions {
    /// How long a verified cache entry is trusted without re-checking
    pub verify_interval: Duration,
    /// Tool names for GPIO drivers
    pub gpio_tools: GpioTools,
    /// OpenSSH settings for the default session manager
    pub ssh: SshConfig,
    /// Runs external commands (gpioset, ssh, scp)
    pub runner: Arc<dyn CommandRunner>,
    /// Overrides the default OpenSSH session manager
    pub sessions: Option<Arc<dyn SessionManager>>,
    /// Device discovery for dynamically matched resources
    pub matcher: Arc<dyn DeviceMatcher>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            verify_interval: Duration::ZERO,
            gpio_tools: GpioTools::default(),
            ssh: SshConfig::default(),
            runner: Arc::new(ProcessRunner),
            sessions: None,
            matcher: Arc::new(SysfsMatcher::new()),
        }
    }
}

// =============================================================================
// Handles
// =============================================================================

/// A registered resource.
#[derive(Clone)]
pub enum ResourceHandle {
    /// File-staging destination
    Provider(Arc<ProviderResource>),
    /// GPIO line of any flavor
    Gpio(Arc<dyn GpioLine>),
}

impl ResourceHandle {
    /// Resource name.
    pub fn name(&self) -> &str {
        match self {
            Self::Provider(p) => p.name(),
            Self::Gpio(g) => g.name(),
        }
    }

    /// Resource kind.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Provider(p) => p.kind(),
            Self::Gpio(g) => g.kind(),
        }
    }

    /// Whether the resource currently has an identity.
    pub fn avail(&self) -> bool {
        match self {
            Self::Provider(p) => p.avail(),
            Self::Gpio(g) => g.avail(),
        }
    }

    /// Refresh dynamic state.
    pub fn update(&self) -> BenchResult<()> {
        match self {
            Self::Provider(p) => p.update(),
            Self::Gpio(g) => g.update(),
        }
    }

    /// [`update`](Self::update) on the blocking pool; device lookups walk sysfs.
    pub async fn refresh(&self) -> BenchResult<()> {
        let handle = self.clone();
        tokio::task::spawn_blocking(move || handle.update())
            .await
            .map_err(|e| BenchError::Io(std::io::Error::other(e)))?
    }
}

/// A registered driver.
#[derive(Clone)]
pub enum DriverHandle {
    /// TFTP, HTTP or NFS staging driver
    Stager(Arc<ProviderDriver>),
    /// GPIO digital output driver
    DigitalOutput(Arc<GpiodDigitalOutputDriver>),
}

impl DriverHandle {
    /// Lifecycle view of the driver.
    pub fn driver(&self) -> &dyn Driver {
        match self {
            Self::Stager(d) => d.as_ref(),
            Self::DigitalOutput(d) => d.as_ref(),
        }
    }
}

/// Summary of a resource for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceInfo {
    /// Resource name
    pub name: String,
    /// Resource kind
    pub kind: ResourceKind,
    /// Identity present
    pub avail: bool,
}

/// Summary of a driver for listings.
#[derive(Debug, Clone, Serialize)]
pub struct DriverInfo {
    /// Driver name
    pub name: String,
    /// Driver type
    pub kind: &'static str,
    /// Bound resource
    pub resource: String,
    /// Lifecycle state
    pub state: DriverState,
}

struct DriverEntry {
    kind: &'static str,
    resource: String,
    handle: DriverHandle,
}

// =============================================================================
// Registry
// =============================================================================

/// Resources and bound drivers of one bench.
pub struct BenchRegistry {
    resources: BTreeMap<String, ResourceHandle>,
    drivers: BTreeMap<String, DriverEntry>,
    cache: Arc<ContentCache>,
}

impl BenchRegistry {
    /// Validate `config`, build every resource, and bind every driver.
    pub fn from_config(config: &BenchConfig, options: RegistryOptions) -> BenchResult<Self> {
        validate_bench_config(config).map_err(|errors| {
            BenchError::Configuration(format!(
                "bench configuration is invalid:\n  - {}",
                errors.join("\n  - ")
            ))
        })?;

        let mut resources = BTreeMap::new();
        for resource in &config.resources {
            let handle = build_resource(resource, &options)?;
            resources.insert(resource.name().to_string(), handle);
        }

        let sessions: Arc<dyn SessionManager> = match &options.sessions {
            Some(sessions) => sessions.clone(),
            None => Arc::new(SshManager::with_runner(
                options.ssh.clone(),
                options.runner.clone(),
            )),
        };
        let cache = Arc::new(ContentCache::with_verify_interval(options.verify_interval));

        let mut drivers = BTreeMap::new();
        for driver in &config.drivers {
            let binding = driver.binding();
            let resource = resources.get(&binding.resource).ok_or_else(|| {
                BenchError::Configuration(format!(
                    "driver '{}': unknown resource '{}'",
                    binding.name, binding.resource
                ))
            })?;
            let handle = build_driver(driver, resource, &cache, &sessions, &options)?;
            tracing::debug!(
                driver = %binding.name,
                kind = driver.driver_type(),
                resource = %binding.resource,
                "driver registered"
            );
            drivers.insert(
                binding.name.clone(),
                DriverEntry {
                    kind: driver.driver_type(),
                    resource: binding.resource.clone(),
                    handle,
                },
            );
        }

        tracing::info!(
            resources = resources.len(),
            drivers = drivers.len(),
            "bench registry ready"
        );
        Ok(Self {
            resources,
            drivers,
            cache,
        })
    }

    /// Resource by name.
    pub fn resource(&self, name: &str) -> Option<&ResourceHandle> {
        self.resources.get(name)
    }

    /// Driver by name.
    pub fn driver(&self, name: &str) -> Option<&DriverHandle> {
        self.drivers.get(name).map(|entry| &entry.handle)
    }

    /// Shared content cache used by every staging driver.
    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// All resources, sorted by name.
    pub fn list_resources(&self) -> Vec<ResourceInfo> {
        self.resources
            .values()
            .map(|r| ResourceInfo {
                name: r.name().to_string(),
                kind: r.kind(),
                avail: r.avail(),
            })
            .collect()
    }

    /// All drivers, sorted by name.
    pub fn list_drivers(&self) -> Vec<DriverInfo> {
        self.drivers
            .iter()
            .map(|(name, entry)| DriverInfo {
                name: name.clone(),
                kind: entry.kind,
                resource: entry.resource.clone(),
                state: entry.handle.driver().state(),
            })
            .collect()
    }

    /// Refresh every resource. Failures are logged and do not stop the
    /// remaining updates; returns the number of failures.
    pub async fn update_resources(&self) -> usize {
        let mut failures = 0;
        for resource in self.resources.values() {
            if let Err(e) = resource.refresh().await {
                tracing::warn!(resource = resource.name(), error = %e, "resource update failed");
                failures += 1;
            }
        }
        failures
    }

    /// Refresh the driver's resource, then activate the driver.
    pub async fn activate(&self, name: &str) -> BenchResult<()> {
        let entry = self.entry(name)?;
        if let Some(resource) = self.resources.get(&entry.resource) {
            resource.refresh().await?;
        }
        entry.handle.driver().activate().await?;
        tracing::info!(driver = name, resource = %entry.resource, "driver activated");
        Ok(())
    }

    /// Deactivate one driver.
    pub async fn deactivate(&self, name: &str) -> BenchResult<()> {
        self.entry(name)?.handle.driver().deactivate().await
    }

    /// Deactivate every active driver.
    pub async fn deactivate_all(&self) -> BenchResult<()> {
        for entry in self.drivers.values() {
            let driver = entry.handle.driver();
            if driver.state() == DriverState::Active {
                driver.deactivate().await?;
            }
        }
        Ok(())
    }

    /// Staging capability of driver `name`.
    pub fn get_stager(&self, name: &str) -> Option<Arc<dyn FileStager>> {
        match self.driver(name)? {
            DriverHandle::Stager(d) => Some(d.clone() as Arc<dyn FileStager>),
            DriverHandle::DigitalOutput(_) => None,
        }
    }

    /// Digital output capability of driver `name`.
    pub fn get_digital_output(&self, name: &str) -> Option<Arc<dyn DigitalOutput>> {
        match self.driver(name)? {
            DriverHandle::DigitalOutput(d) => Some(d.clone() as Arc<dyn DigitalOutput>),
            DriverHandle::Stager(_) => None,
        }
    }

    /// Whether a driver named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    /// Number of drivers.
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    /// Whether the registry has no drivers.
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    fn entry(&self, name: &str) -> BenchResult<&DriverEntry> {
        self.drivers
            .get(name)
            .ok_or_else(|| BenchError::Configuration(format!("unknown driver '{}'", name)))
    }
}

fn build_resource(
    config: &ResourceConfig,
    options: &RegistryOptions,
) -> BenchResult<ResourceHandle> {
    let handle = match config {
        ResourceConfig::GpiodGpio(c) => {
            ResourceHandle::Gpio(Arc::new(GpiodGpio::new(&c.name, c.chip.clone(), c.pin)))
        }
        ResourceConfig::RawGpiodGpio(c) => {
            ResourceHandle::Gpio(Arc::new(RawGpiodGpio::new(&c.name, c.chip.clone(), c.pin)?))
        }
        ResourceConfig::NetworkGpiodGpio(c) => ResourceHandle::Gpio(Arc::new(
            NetworkGpiodGpio::new(&c.name, &c.host, &c.chip, c.pin)?,
        )),
        ResourceConfig::UsbGpiodGpio(c) => ResourceHandle::Gpio(Arc::new(UsbGpiodGpio::new(
            &c.name,
            c.pin,
            c.match_spec.clone(),
            options.matcher.clone(),
        ))),
        _ => {
            let p = config.provider().ok_or_else(|| {
                BenchError::Configuration(format!("resource '{}' is not a provider", config.name()))
            })?;
            ResourceHandle::Provider(Arc::new(ProviderResource::new(
                &p.name,
                config.kind(),
                &p.host,
                &p.internal,
                &p.external,
            )?))
        }
    };
    Ok(handle)
}

fn build_driver(
    config: &DriverConfig,
    resource: &ResourceHandle,
    cache: &Arc<ContentCache>,
    sessions: &Arc<dyn SessionManager>,
    options: &RegistryOptions,
) -> BenchResult<DriverHandle> {
    let name = config.name();
    match (config.flavor(), resource) {
        (Some(flavor), ResourceHandle::Provider(provider)) => {
            let driver = ProviderDriver::new(name, flavor, cache.clone(), sessions.clone());
            let provider: Arc<dyn Provider> = provider.clone();
            driver.bind(provider)?;
            Ok(DriverHandle::Stager(Arc::new(driver)))
        }
        (None, ResourceHandle::Gpio(line)) => {
            let driver = GpiodDigitalOutputDriver::with_runner(
                name,
                options.gpio_tools.clone(),
                options.runner.clone(),
            );
            driver.bind(line.clone())?;
            Ok(DriverHandle::DigitalOutput(Arc::new(driver)))
        }
        _ => Err(BenchError::BindingMismatch {
            driver: name.to_string(),
            resource: resource.name().to_string(),
            kind: resource.kind(),
            accepted: ResourceKind::join(config.accepts()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_bench_config_from_str;

    #[test]
    fn test_invalid_config_is_configuration_error() {
        let config = load_bench_config_from_str("").unwrap();
        assert!(BenchRegistry::from_config(&config, RegistryOptions::default())
            .unwrap()
            .is_empty());

        let bad: BenchConfig = toml::from_str(
            r#"
[[drivers]]
kind = "tftp_provider_driver"
name = "tftp"
resource = "nowhere"
"#,
        )
        .unwrap();
        assert!(matches!(
            BenchRegistry::from_config(&bad, RegistryOptions::default()),
            Err(BenchError::Configuration(_))
        ));
    }

    struct ThreadMatcher {
        threads: parking_lot::Mutex<Vec<std::thread::ThreadId>>,
        fail: bool,
    }

    impl DeviceMatcher for ThreadMatcher {
        fn enumerate(&self) -> BenchResult<Vec<crate::matcher::DiscoveredDevice>> {
            self.threads.lock().push(std::thread::current().id());
            if self.fail {
                return Err(BenchError::Configuration("sysfs unreadable".to_string()));
            }
            Ok(Vec::new())
        }
    }

    fn usb_bench(fail: bool) -> (BenchRegistry, Arc<ThreadMatcher>) {
        let config = load_bench_config_from_str(
            r#"
[[resources]]
kind = "usb_gpiod_gpio"
name = "reset"
pin = 1

[[drivers]]
kind = "gpiod_digital_output_driver"
name = "reset"
resource = "reset"
"#,
        )
        .unwrap();
        let matcher = Arc::new(ThreadMatcher {
            threads: parking_lot::Mutex::new(Vec::new()),
            fail,
        });
        let options = RegistryOptions {
            matcher: matcher.clone(),
            ..RegistryOptions::default()
        };
        (BenchRegistry::from_config(&config, options).unwrap(), matcher)
    }

    #[tokio::test]
    async fn test_device_lookup_runs_off_the_runtime_thread() {
        let (registry, matcher) = usb_bench(false);
        registry.activate("reset").await.unwrap();
        assert_eq!(registry.update_resources().await, 0);

        let threads = matcher.threads.lock();
        assert_eq!(threads.len(), 2);
        assert!(threads.iter().all(|id| *id != std::thread::current().id()));
    }

    #[tokio::test]
    async fn test_failed_lookup_is_counted_and_blocks_activation() {
        let (registry, _matcher) = usb_bench(true);
        assert_eq!(registry.update_resources().await, 1);
        assert!(registry.activate("reset").await.is_err());
        assert_eq!(registry.driver("reset").unwrap().driver().state(), DriverState::Bound);
    }
}
