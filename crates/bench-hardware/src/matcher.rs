//! Device discovery for dynamically matched resources.
//!
//! Dynamic resources (a USB GPIO controller, for example) have no fixed
//! device path. Instead they carry a [`MatchSpec`] of required properties and
//! ask a [`DeviceMatcher`] which devices are currently present.
//!
//! # Match keys
//!
//! | Key | Compared against |
//! |-----|------------------|
//! | `SUBSYSTEM` | the device's subsystem |
//! | `NAME` | the device's `uevent` property `NAME` |
//! | `@SUBSYSTEM` | the subsystem of *any* ancestor device |
//! | `@NAME` | the property `NAME` of any ancestor device |
//!
//! # Linux sysfs
//!
//! [`SysfsMatcher`] walks `<root>/bus/*/devices/*` and `<root>/class/*/*`,
//! resolves every entry to its canonical path under `<root>/devices`, and
//! reads the `uevent` file of the device and of each parent directory:
//!
//! ```text
//! /sys/devices/pci0000:00/.../1-1           SUBSYSTEM=usb   (ancestor)
//! /sys/devices/pci0000:00/.../1-1/1-1:1.0   SUBSYSTEM=usb   (ancestor)
//! /sys/devices/pci0000:00/.../gpiochip4     SUBSYSTEM=gpio  DEVNAME=gpiochip4
//! ```

use bench_core::{BenchError, BenchResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Properties of one device in the ancestry chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceAncestor {
    /// Canonical sysfs path
    pub sys_path: PathBuf,
    /// Subsystem name, if the device has one
    pub subsystem: Option<String>,
    /// `uevent` properties
    pub properties: BTreeMap<String, String>,
}

/// A device reported by a [`DeviceMatcher`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Canonical sysfs path
    pub sys_path: PathBuf,
    /// Subsystem name, if the device has one
    pub subsystem: Option<String>,
    /// `uevent` properties
    pub properties: BTreeMap<String, String>,
    /// Device node (`/dev/...`) when the device exposes one
    pub device_node: Option<String>,
    /// Parent devices, nearest first
    pub parents: Vec<DeviceAncestor>,
}

impl DiscoveredDevice {
    /// Value of `key` on this device (`SUBSYSTEM` reads the subsystem).
    pub fn property(&self, key: &str) -> Option<&str> {
        lookup(self.subsystem.as_deref(), &self.properties, key)
    }
}

fn lookup<'a>(
    subsystem: Option<&'a str>,
    properties: &'a BTreeMap<String, String>,
    key: &str,
) -> Option<&'a str> {
    if key == "SUBSYSTEM" {
        subsystem
    } else {
        properties.get(key).map(String::as_str)
    }
}

/// Required property equalities for a dynamic resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchSpec(BTreeMap<String, String>);

impl MatchSpec {
    /// Empty specification (matches every device).
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key == value`; `@key` applies to ancestors.
    pub fn require(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set or overwrite a requirement in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Requirements in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether `device` satisfies every requirement.
    pub fn matches(&self, device: &DiscoveredDevice) -> bool {
        self.0.iter().all(|(key, expected)| match key.strip_prefix('@') {
            Some(key) => device.parents.iter().any(|parent| {
                lookup(parent.subsystem.as_deref(), &parent.properties, key)
                    == Some(expected.as_str())
            }),
            None => device.property(key) == Some(expected.as_str()),
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MatchSpec {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Source of currently present devices.
pub trait DeviceMatcher: Send + Sync {
    /// Snapshot of all devices present right now.
    fn enumerate(&self) -> BenchResult<Vec<DiscoveredDevice>>;
}

// =============================================================================
// sysfs implementation
// =============================================================================

/// [`DeviceMatcher`] reading the Linux sysfs tree.
#[derive(Debug, Clone)]
pub struct SysfsMatcher {
    root: PathBuf,
}

impl SysfsMatcher {
    /// Matcher rooted at `/sys`.
    pub fn new() -> Self {
        Self::with_root("/sys")
    }

    /// Matcher rooted at `root` (a fake tree in tests).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Canonical paths of every bus and class device.
    fn device_paths(&self) -> BenchResult<BTreeSet<PathBuf>> {
        let mut paths = BTreeSet::new();
        for (group, nested) in [("bus", Some("devices")), ("class", None)] {
            let dir = self.root.join(group);
            if !dir.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&dir)? {
                let mut base = entry?.path();
                if let Some(nested) = nested {
                    base.push(nested);
                }
                let Ok(devices) = fs::read_dir(&base) else {
                    continue;
                };
                for device in devices {
                    // Dangling links are skipped; the device went away mid-scan.
                    if let Ok(path) = fs::canonicalize(device?.path()) {
                        paths.insert(path);
                    }
                }
            }
        }
        Ok(paths)
    }

    fn ancestors(&self, device: &Path) -> Vec<DeviceAncestor> {
        let root = fs::canonicalize(&self.root).unwrap_or_else(|_| self.root.clone());
        device
            .ancestors()
            .skip(1)
            .take_while(|dir| dir.starts_with(&root) && *dir != root.as_path())
            .filter(|dir| dir.join("uevent").is_file())
            .map(|dir| DeviceAncestor {
                sys_path: dir.to_path_buf(),
                subsystem: read_subsystem(dir),
                properties: read_uevent(dir),
            })
            .collect()
    }
}

impl Default for SysfsMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceMatcher for SysfsMatcher {
    fn enumerate(&self) -> BenchResult<Vec<DiscoveredDevice>> {
        if !self.root.is_dir() {
            return Err(BenchError::Configuration(format!(
                "sysfs root '{}' does not exist",
                self.root.display()
            )));
        }

        let devices = self
            .device_paths()?
            .into_iter()
            .map(|path| {
                let properties = read_uevent(&path);
                DiscoveredDevice {
                    subsystem: read_subsystem(&path),
                    device_node: properties.get("DEVNAME").map(String::as_str).map(dev_node),
                    parents: self.ancestors(&path),
                    properties,
                    sys_path: path,
                }
            })
            .collect::<Vec<_>>();

        tracing::trace!(root = %self.root.display(), count = devices.len(), "enumerated devices");
        Ok(devices)
    }
}

fn dev_node(devname: &str) -> String {
    if devname.starts_with('/') {
        devname.to_string()
    } else {
        format!("/dev/{}", devname)
    }
}

fn read_subsystem(dir: &Path) -> Option<String> {
    let target = fs::read_link(dir.join("subsystem")).ok()?;
    target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

fn read_uevent(dir: &Path) -> BTreeMap<String, String> {
    fs::read_to_string(dir.join("uevent"))
        .map(|content| parse_uevent(&content))
        .unwrap_or_default()
}

/// Parse `KEY=VALUE` lines.
pub fn parse_uevent(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}
