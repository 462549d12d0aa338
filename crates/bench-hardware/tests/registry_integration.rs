//! Building a bench from TOML and driving it through the registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use bench_core::{BenchError, BenchResult, CommandRunner, DriverState, Locator, ResourceKind};
use bench_hardware::config::load_bench_config_from_str;
use bench_hardware::matcher::DeviceAncestor;
use bench_hardware::{BenchRegistry, DeviceMatcher, DiscoveredDevice, GpioTools, RegistryOptions};
use parking_lot::Mutex;

#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn check_output(&self, argv: &[String]) -> BenchResult<Vec<u8>> {
        self.calls.lock().push(argv.to_vec());
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct HotplugMatcher {
    devices: Mutex<Vec<DiscoveredDevice>>,
}

impl HotplugMatcher {
    fn plug(&self, devname: &str, serial: &str) {
        self.devices.lock().push(DiscoveredDevice {
            subsystem: Some("gpio".to_string()),
            properties: BTreeMap::from([("DEVNAME".to_string(), devname.to_string())]),
            device_node: Some(format!("/dev/{devname}")),
            parents: vec![DeviceAncestor {
                subsystem: Some("usb".to_string()),
                properties: BTreeMap::from([(
                    "ID_SERIAL_SHORT".to_string(),
                    serial.to_string(),
                )]),
                ..DeviceAncestor::default()
            }],
            ..DiscoveredDevice::default()
        });
    }
}

impl DeviceMatcher for HotplugMatcher {
    fn enumerate(&self) -> BenchResult<Vec<DiscoveredDevice>> {
        Ok(self.devices.lock().clone())
    }
}

fn bench_toml(tftp_root: &std::path::Path) -> String {
    format!(
        r#"
[[resources]]
kind = "tftp_provider"
name = "tftp"
internal = "{root}"
external = "/tftpboot"

[[resources]]
kind = "gpiod_gpio"
name = "power"
chip = "/dev/gpiochip0"
pin = 5

[[resources]]
kind = "usb_gpiod_gpio"
name = "reset"
pin = 2
match = {{ "@ID_SERIAL_SHORT" = "A1" }}

[[drivers]]
kind = "tftp_provider_driver"
name = "tftp"
resource = "tftp"

[[drivers]]
kind = "gpiod_digital_output_driver"
name = "power"
resource = "power"

[[drivers]]
kind = "gpiod_digital_output_driver"
name = "reset"
resource = "reset"
"#,
        root = tftp_root.display()
    )
}

fn registry(
    tftp_root: &std::path::Path,
    runner: Arc<RecordingRunner>,
    matcher: Arc<HotplugMatcher>,
) -> Result<BenchRegistry> {
    let config = load_bench_config_from_str(&bench_toml(tftp_root))?;
    let options = RegistryOptions {
        gpio_tools: GpioTools {
            gpioset: "/usr/bin/gpioset".to_string(),
            ..GpioTools::default()
        },
        runner,
        matcher,
        ..RegistryOptions::default()
    };
    Ok(BenchRegistry::from_config(&config, options)?)
}

#[tokio::test]
async fn test_registry_binds_every_driver() -> Result<()> {
    let root = tempfile::tempdir()?;
    let registry = registry(
        root.path(),
        Arc::new(RecordingRunner::default()),
        Arc::new(HotplugMatcher::default()),
    )?;

    let drivers = registry.list_drivers();
    let names: Vec<_> = drivers.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, ["power", "reset", "tftp"]);
    assert!(drivers.iter().all(|d| d.state == DriverState::Bound));

    let resources = registry.list_resources();
    let reset = resources.iter().find(|r| r.name == "reset").unwrap();
    assert_eq!(reset.kind, ResourceKind::UsbGpiodGpio);
    assert!(!reset.avail);

    assert!(registry.get_stager("tftp").is_some());
    assert!(registry.get_stager("power").is_none());
    assert!(registry.get_digital_output("power").is_some());
    Ok(())
}

#[tokio::test]
async fn test_stage_through_registry() -> Result<()> {
    let src = tempfile::tempdir()?;
    let root = tempfile::tempdir()?;
    let image = src.path().join("zImage");
    std::fs::write(&image, b"ABC")?;

    let registry = registry(
        root.path(),
        Arc::new(RecordingRunner::default()),
        Arc::new(HotplugMatcher::default()),
    )?;
    let stager = registry.get_stager("tftp").unwrap();

    let vars = stager.get_export_vars()?;
    assert_eq!(vars.external, "/tftpboot");
    assert!(matches!(
        stager.stage(&image).await,
        Err(BenchError::NotActive { .. })
    ));

    registry.activate("tftp").await?;
    let locator = stager.stage(&image).await?;
    assert_eq!(
        locator,
        Locator::Path(
            "/tftpboot/b5d4045c3f466fa91fe2cc6abe79232a1a57cdf104f7a26e716e0a1e2789df78-zImage"
                .to_string()
        )
    );
    assert_eq!(registry.cache().entries().len(), 1);

    registry.deactivate_all().await?;
    assert!(matches!(
        stager.stage(&image).await,
        Err(BenchError::NotActive { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_gpio_through_registry() -> Result<()> {
    let root = tempfile::tempdir()?;
    let runner = Arc::new(RecordingRunner::default());
    let registry = registry(root.path(), runner.clone(), Arc::new(HotplugMatcher::default()))?;

    registry.activate("power").await?;
    let power = registry.get_digital_output("power").unwrap();
    power.set(true).await?;
    assert!(!power.get().await?);

    let calls = runner.calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], ["/usr/bin/gpioset", "-t0", "-c", "/dev/gpiochip0", "5=1"]);
    Ok(())
}

#[tokio::test]
async fn test_usb_line_follows_hotplug() -> Result<()> {
    let root = tempfile::tempdir()?;
    let runner = Arc::new(RecordingRunner::default());
    let matcher = Arc::new(HotplugMatcher::default());
    let registry = registry(root.path(), runner.clone(), matcher.clone())?;

    registry.activate("reset").await?;
    let reset = registry.get_digital_output("reset").unwrap();
    assert!(matches!(
        reset.set(true).await,
        Err(BenchError::ResourceUnavailable { .. })
    ));

    matcher.plug("gpiochip7", "OTHER");
    matcher.plug("gpiochip4", "A1");
    assert_eq!(registry.update_resources().await, 0);

    reset.set(false).await?;
    assert_eq!(
        runner.calls.lock()[0],
        ["/usr/bin/gpioset", "-t0", "-c", "/dev/gpiochip4", "2=0"]
    );

    registry.deactivate("reset").await?;
    assert!(matches!(
        reset.set(true).await,
        Err(BenchError::NotActive { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_unknown_driver() -> Result<()> {
    let root = tempfile::tempdir()?;
    let registry = registry(
        root.path(),
        Arc::new(RecordingRunner::default()),
        Arc::new(HotplugMatcher::default()),
    )?;
    assert!(matches!(
        registry.activate("console").await,
        Err(BenchError::Configuration(_))
    ));
    Ok(())
}
