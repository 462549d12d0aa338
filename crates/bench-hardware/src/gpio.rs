//! GPIO line resources.
//!
//! | Kind | Chip | Where commands run |
//! |------|------|--------------------|
//! | [`GpiodGpio`] | optional, fixed | locally |
//! | [`RawGpiodGpio`] | required, fixed | locally |
//! | [`NetworkGpiodGpio`] | required, fixed | on `host` via ssh |
//! | [`UsbGpiodGpio`] | owned by the device matcher | locally |

use crate::matcher::{DeviceMatcher, DiscoveredDevice, MatchSpec};
use bench_core::{BenchError, BenchResult, GpioLine, Resource, ResourceKind};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Local GPIO line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpiodGpio {
    name: String,
    chip: Option<String>,
    pin: u32,
}

impl GpiodGpio {
    /// Line `pin` on `chip` (the driver refuses to switch a line without one).
    pub fn new(name: impl Into<String>, chip: Option<String>, pin: u32) -> Self {
        Self {
            name: name.into(),
            chip,
            pin,
        }
    }
}

impl Resource for GpiodGpio {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::GpiodGpio
    }
}

impl GpioLine for GpiodGpio {
    fn chip(&self) -> Option<String> {
        self.chip.clone()
    }

    fn pin(&self) -> u32 {
        self.pin
    }
}

/// Local GPIO line referenced directly by chip device name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGpiodGpio {
    name: String,
    chip: String,
    pin: u32,
}

impl RawGpiodGpio {
    /// Fails with a configuration error when `chip` is missing or empty.
    pub fn new(name: impl Into<String>, chip: Option<String>, pin: u32) -> BenchResult<Self> {
        let name = name.into();
        match chip {
            Some(chip) if !chip.is_empty() => Ok(Self { name, chip, pin }),
            _ => Err(BenchError::Configuration(format!(
                "resource '{}': raw_gpiod_gpio must be configured with a chip",
                name
            ))),
        }
    }
}

impl Resource for RawGpiodGpio {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::RawGpiodGpio
    }
}

impl GpioLine for RawGpiodGpio {
    fn chip(&self) -> Option<String> {
        Some(self.chip.clone())
    }

    fn pin(&self) -> u32 {
        self.pin
    }
}

/// GPIO line on an exporter host, switched over ssh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkGpiodGpio {
    name: String,
    host: String,
    chip: String,
    pin: u32,
}

impl NetworkGpiodGpio {
    /// Line `pin` on `chip` at `host`. Host and chip must be non-empty.
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        chip: impl Into<String>,
        pin: u32,
    ) -> BenchResult<Self> {
        let (name, host, chip) = (name.into(), host.into(), chip.into());
        if host.is_empty() || chip.is_empty() {
            return Err(BenchError::Configuration(format!(
                "resource '{}': network_gpiod_gpio needs both host and chip",
                name
            )));
        }
        Ok(Self {
            name,
            host,
            chip,
            pin,
        })
    }
}

impl Resource for NetworkGpiodGpio {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::NetworkGpiodGpio
    }
}

impl GpioLine for NetworkGpiodGpio {
    fn chip(&self) -> Option<String> {
        Some(self.chip.clone())
    }

    fn pin(&self) -> u32 {
        self.pin
    }

    fn host(&self) -> Option<&str> {
        Some(&self.host)
    }
}

// =============================================================================
// USB GPIO (dynamically matched)
// =============================================================================

/// GPIO line on a USB GPIO controller located by device matching.
///
/// The chip is not configured; [`Resource::update`] re-runs the match and
/// adopts the device node of the single matching controller, or clears it.
pub struct UsbGpiodGpio {
    name: String,
    pin: u32,
    spec: MatchSpec,
    matcher: Arc<dyn DeviceMatcher>,
    device: RwLock<Option<DiscoveredDevice>>,
}

impl UsbGpiodGpio {
    /// Create an unmatched line. `spec` is extended with
    /// `SUBSYSTEM=gpio` and `@SUBSYSTEM=usb`.
    pub fn new(
        name: impl Into<String>,
        pin: u32,
        mut spec: MatchSpec,
        matcher: Arc<dyn DeviceMatcher>,
    ) -> Self {
        spec.insert("SUBSYSTEM", "gpio");
        spec.insert("@SUBSYSTEM", "usb");
        Self {
            name: name.into(),
            pin,
            spec,
            matcher,
            device: RwLock::new(None),
        }
    }

    /// Effective match specification.
    pub fn spec(&self) -> &MatchSpec {
        &self.spec
    }

    /// Matched device, if any.
    pub fn device(&self) -> Option<DiscoveredDevice> {
        self.device.read().clone()
    }
}

impl fmt::Debug for UsbGpiodGpio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsbGpiodGpio")
            .field("name", &self.name)
            .field("pin", &self.pin)
            .field("spec", &self.spec)
            .field("device", &*self.device.read())
            .finish()
    }
}

impl Resource for UsbGpiodGpio {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::UsbGpiodGpio
    }

    fn avail(&self) -> bool {
        self.device
            .read()
            .as_ref()
            .is_some_and(|d| d.device_node.is_some())
    }

    fn update(&self) -> BenchResult<()> {
        let devices = match self.matcher.enumerate() {
            Ok(devices) => devices,
            Err(e) => {
                *self.device.write() = None;
                return Err(e);
            }
        };

        // Character devices only; the sysfs-only gpiochip interface has no DEVNAME.
        let mut matches: Vec<DiscoveredDevice> = devices
            .into_iter()
            .filter(|d| d.properties.contains_key("DEVNAME"))
            .filter(|d| self.spec.matches(d))
            .collect();

        let adopted = match matches.len() {
            1 => matches.pop().filter(|d| d.device_node.is_some()),
            0 => None,
            n => {
                tracing::warn!(resource = %self.name, count = n, "ambiguous device match");
                None
            }
        };

        let mut slot = self.device.write();
        let before = slot.as_ref().and_then(|d| d.device_node.clone());
        let after = adopted.as_ref().and_then(|d| d.device_node.clone());
        if before != after {
            match &after {
                Some(node) => tracing::info!(resource = %self.name, chip = %node, "device matched"),
                None => tracing::info!(resource = %self.name, "device lost"),
            }
        }
        *slot = adopted;
        Ok(())
    }
}

impl GpioLine for UsbGpiodGpio {
    fn chip(&self) -> Option<String> {
        self.device.read().as_ref().and_then(|d| d.device_node.clone())
    }

    fn pin(&self) -> u32 {
        self.pin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::DeviceAncestor;
    use parking_lot::Mutex;

    struct FixedMatcher(Mutex<Vec<DiscoveredDevice>>);

    impl DeviceMatcher for FixedMatcher {
        fn enumerate(&self) -> BenchResult<Vec<DiscoveredDevice>> {
            Ok(self.0.lock().clone())
        }
    }

    fn usb_chip(devname: Option<&str>, serial: &str) -> DiscoveredDevice {
        DiscoveredDevice {
            subsystem: Some("gpio".to_string()),
            properties: devname
                .map(|n| [("DEVNAME".to_string(), n.to_string())].into())
                .unwrap_or_default(),
            device_node: devname.map(|n| format!("/dev/{n}")),
            parents: vec![DeviceAncestor {
                subsystem: Some("usb".to_string()),
                properties: [("ID_SERIAL_SHORT".to_string(), serial.to_string())].into(),
                ..DeviceAncestor::default()
            }],
            ..DiscoveredDevice::default()
        }
    }

    #[test]
    fn test_raw_requires_chip() {
        assert!(RawGpiodGpio::new("relay", None, 3).is_err());
        assert!(RawGpiodGpio::new("relay", Some(String::new()), 3).is_err());
        let raw = RawGpiodGpio::new("relay", Some("/dev/gpiochip1".into()), 3).unwrap();
        assert_eq!(raw.chip().as_deref(), Some("/dev/gpiochip1"));
    }

    #[test]
    fn test_network_requires_host() {
        assert!(NetworkGpiodGpio::new("relay", "", "gpiochip0", 1).is_err());
        let line = NetworkGpiodGpio::new("relay", "exporter", "gpiochip0", 1).unwrap();
        assert_eq!(GpioLine::host(&line), Some("exporter"));
    }

    #[test]
    fn test_usb_spec_is_forced() {
        let matcher = Arc::new(FixedMatcher(Mutex::new(Vec::new())));
        let spec = MatchSpec::new()
            .require("SUBSYSTEM", "tty")
            .require("@ID_SERIAL_SHORT", "A1");
        let line = UsbGpiodGpio::new("usb", 0, spec, matcher);
        let keys: Vec<_> = line.spec().iter().collect();
        assert!(keys.contains(&("SUBSYSTEM", "gpio")));
        assert!(keys.contains(&("@SUBSYSTEM", "usb")));
        assert!(keys.contains(&("@ID_SERIAL_SHORT", "A1")));
    }

    #[test]
    fn test_usb_update_adopts_and_clears() {
        let matcher = Arc::new(FixedMatcher(Mutex::new(vec![
            usb_chip(Some("gpiochip4"), "A1"),
            // sysfs interface of the same controller
            usb_chip(None, "A1"),
        ])));
        let spec = MatchSpec::new().require("@ID_SERIAL_SHORT", "A1");
        let line = UsbGpiodGpio::new("usb", 2, spec, matcher.clone());

        assert!(!line.avail());
        assert_eq!(line.chip(), None);

        line.update().unwrap();
        assert!(line.avail());
        assert_eq!(line.chip().as_deref(), Some("/dev/gpiochip4"));

        matcher.0.lock().clear();
        line.update().unwrap();
        assert!(!line.avail());
        assert_eq!(line.chip(), None);
    }

    #[test]
    fn test_usb_ambiguous_match_is_absent() {
        let matcher = Arc::new(FixedMatcher(Mutex::new(vec![
            usb_chip(Some("gpiochip4"), "A1"),
            usb_chip(Some("gpiochip5"), "B2"),
        ])));
        let line = UsbGpiodGpio::new("usb", 0, MatchSpec::new(), matcher);
        line.update().unwrap();
        assert!(!line.avail());
    }
}
