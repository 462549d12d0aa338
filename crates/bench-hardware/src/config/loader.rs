//! Loading and validating bench descriptions.
//!
//! # Usage
//!
//! ```rust,ignore
//! use bench_hardware::config::loader::load_bench_config;
//! use std::path::Path;
//!
//! let bench = load_bench_config(Path::new("bench.toml"))?;
//! for resource in &bench.resources {
//!     println!("{} ({})", resource.name(), resource.kind());
//! }
//! ```

use super::schema::{BenchConfig, ResourceConfig};
use anyhow::{Context, Result};
use bench_core::is_local_host;
use figment::{
    providers::{Format, Toml},
    Figment,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Error types for bench config loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    /// File not found
    #[error("Bench config file not found: {0}")]
    NotFound(String),

    /// Cross-entry validation failed
    #[error("Bench configuration validation failed:\n  - {}", .0.join("\n  - "))]
    ValidationError(Vec<String>),
}

/// Default bench description location: `<config_dir>/rust_bench/bench.toml`.
pub fn default_bench_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("rust_bench").join("bench.toml"))
}

/// Load and validate a bench description from a TOML file.
pub fn load_bench_config(path: &Path) -> Result<BenchConfig> {
    if !path.exists() {
        return Err(ConfigLoadError::NotFound(path.display().to_string()).into());
    }

    debug!("Loading bench config from: {}", path.display());

    let config: BenchConfig = Figment::new()
        .merge(Toml::file(path))
        .extract()
        .with_context(|| format!("Failed to parse bench config: {}", path.display()))?;

    validate_bench_config(&config).map_err(ConfigLoadError::ValidationError)?;

    info!(
        "Loaded bench config: {} resource(s), {} driver(s)",
        config.resources.len(),
        config.drivers.len()
    );
    Ok(config)
}

/// Parse and validate a bench description from a TOML string.
pub fn load_bench_config_from_str(toml_content: &str) -> Result<BenchConfig> {
    let config: BenchConfig =
        toml::from_str(toml_content).with_context(|| "Failed to parse TOML content")?;
    validate_bench_config(&config).map_err(ConfigLoadError::ValidationError)?;
    Ok(config)
}

/// Check every entry and every cross reference, reporting all problems.
pub fn validate_bench_config(config: &BenchConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    let mut resources: HashMap<&str, &ResourceConfig> = HashMap::new();

    for resource in &config.resources {
        let label = format!("Resource '{}' ({})", resource.name(), resource.kind());

        if let Err(e) = resource.validate_fields() {
            errors.push(format!("{}: {}", label, e));
        }
        if let Err(e) = check_resource(resource) {
            errors.push(format!("{}: {}", label, e));
        }
        if resources.insert(resource.name(), resource).is_some() {
            errors.push(format!("{}: duplicate resource name", label));
        }
    }

    let mut driver_names = HashSet::new();
    for driver in &config.drivers {
        let binding = driver.binding();
        let label = format!("Driver '{}' ({})", binding.name, driver.driver_type());

        if binding.name.is_empty() {
            errors.push(format!("{}: name must not be empty", label));
        }
        if !driver_names.insert(binding.name.as_str()) {
            errors.push(format!("{}: duplicate driver name", label));
        }

        match resources.get(binding.resource.as_str()) {
            None => errors.push(format!(
                "{}: unknown resource '{}'",
                label, binding.resource
            )),
            Some(resource) if !driver.accepts().contains(&resource.kind()) => {
                errors.push(format!(
                    "{}: cannot bind '{}' of kind '{}' (accepts: {})",
                    label,
                    binding.resource,
                    resource.kind(),
                    bench_core::ResourceKind::join(driver.accepts())
                ))
            }
            Some(_) => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Per-kind rules that serde and field validation cannot express.
fn check_resource(resource: &ResourceConfig) -> Result<(), String> {
    match resource {
        ResourceConfig::RawGpiodGpio(c) if c.chip.as_deref().unwrap_or("").is_empty() => {
            Err("raw_gpiod_gpio must be configured with a chip".to_string())
        }
        ResourceConfig::UsbGpiodGpio(c) if c.chip.is_some() => {
            warn!(
                "Resource '{}': the chip attribute is ignored; it is taken from the matched device",
                c.name
            );
            Ok(())
        }
        _ => match resource.provider() {
            Some(p) if !p.internal.is_absolute() => Err(format!(
                "internal path '{}' must be absolute",
                p.internal.display()
            )),
            Some(p) if resource.kind().is_remote() && p.host.is_empty() => {
                Err("remote providers require a host".to_string())
            }
            Some(p) if !resource.kind().is_remote() && !is_local_host(&p.host) => Err(format!(
                "host '{}' is not local; use the remote_{} kind",
                p.host,
                resource.kind()
            )),
            _ => Ok(()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BENCH: &str = r#"
[[resources]]
kind = "remote_tftp_provider"
name = "tftp"
host = "exporter"
internal = "/srv/tftp"
external = "board/"

[[resources]]
kind = "nfs_provider"
name = "nfs"
internal = "/srv/nfs"

[[resources]]
kind = "gpiod_gpio"
name = "power"
chip = "/dev/gpiochip0"
pin = 5

[[resources]]
kind = "usb_gpiod_gpio"
name = "reset"
pin = 2
match = { "@ID_SERIAL_SHORT" = "A1B2" }

[[drivers]]
kind = "tftp_provider_driver"
name = "tftp"
resource = "tftp"

[[drivers]]
kind = "nfs_provider_driver"
name = "nfs"
resource = "nfs"

[[drivers]]
kind = "gpiod_digital_output_driver"
name = "power"
resource = "power"
"#;

    #[test]
    fn test_load_full_bench() {
        let config = load_bench_config_from_str(BENCH).unwrap();
        assert_eq!(config.resources.len(), 4);
        assert_eq!(config.drivers.len(), 3);

        let tftp = config.resources[0].provider().unwrap();
        assert_eq!(tftp.host, "exporter");
        assert_eq!(tftp.external, "board/");

        match &config.resources[3] {
            ResourceConfig::UsbGpiodGpio(usb) => {
                assert_eq!(
                    usb.match_spec.iter().collect::<Vec<_>>(),
                    vec![("@ID_SERIAL_SHORT", "A1B2")]
                );
            }
            other => panic!("unexpected resource: {other:?}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.toml");
        std::fs::write(&path, BENCH).unwrap();
        assert_eq!(load_bench_config(&path).unwrap().drivers.len(), 3);

        let missing = load_bench_config(&dir.path().join("missing.toml")).unwrap_err();
        assert!(missing.to_string().contains("not found"));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result = load_bench_config_from_str(
            r#"
[[resources]]
kind = "serial_port"
name = "console"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_all_problems_reported_at_once() {
        let err = load_bench_config_from_str(
            r#"
[[resources]]
kind = "raw_gpiod_gpio"
name = "relay"

[[resources]]
kind = "tftp_provider"
name = "relay"
internal = "srv/tftp"

[[resources]]
kind = "remote_http_provider"
name = "web"
internal = "/srv/www"

[[drivers]]
kind = "http_provider_driver"
name = "web"
resource = "relay"

[[drivers]]
kind = "gpiod_digital_output_driver"
name = "web"
resource = "missing"
"#,
        )
        .unwrap_err();

        let message = err.to_string();
        for expected in [
            "must be configured with a chip",
            "must be absolute",
            "duplicate resource name",
            "require a host",
            "cannot bind 'relay'",
            "duplicate driver name",
            "unknown resource 'missing'",
        ] {
            assert!(message.contains(expected), "missing {expected:?} in:\n{message}");
        }
    }

    #[test]
    fn test_local_provider_with_remote_host_rejected() {
        let err = load_bench_config_from_str(
            r#"
[[resources]]
kind = "http_provider"
name = "web"
host = "exporter"
internal = "/srv/www"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("remote_http_provider"));
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = load_bench_config_from_str(
            r#"
[[resources]]
kind = "gpiod_gpio"
name = ""
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("validation failed"));
    }
}
