//! Application configuration using Figment.
//!
//! Configuration is loaded from (later sources override earlier ones):
//! 1. Built-in defaults
//! 2. A TOML file (default `<config_dir>/rust_bench/config.toml`)
//! 3. Environment variables prefixed with `RUST_BENCH_`, using `__` between
//!    section and key
//!
//! # Example
//! ```no_run
//! use rust_bench::config::AppConfig;
//!
//! // RUST_BENCH_APPLICATION__LOG_LEVEL=debug overrides [application] log_level
//! let config = AppConfig::load()?;
//! println!("verify interval: {:?}", config.staging.verify_interval);
//! # Ok::<(), figment::Error>(())
//! ```
//!
//! # File format
//! ```toml
//! [application]
//! log_level = "info"
//! log_format = "pretty"
//! log_spans = false
//! bench = "/etc/rust_bench/bench.toml"
//!
//! [staging]
//! verify_interval = "5m"
//!
//! [tools]
//! gpioset = "/usr/bin/gpioset"
//! ssh = "ssh"
//! scp = "scp"
//! ssh_options = ["-o", "ConnectTimeout=10"]
//! ```

use crate::tracing_setup::OutputFormat;
use bench_hardware::{GpioTools, RegistryOptions};
use bench_staging::SshConfig;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "RUST_BENCH_";

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Content cache settings
    pub staging: StagingConfig,
    /// External tool names
    pub tools: ToolsConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: OutputFormat,
    /// Log span open/close events (e.g. the duration of each `stage`)
    pub log_spans: bool,
    /// Bench description file
    pub bench: Option<PathBuf>,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: OutputFormat::Pretty,
            log_spans: false,
            bench: None,
        }
    }
}

/// Content cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Trust a verified cache entry for this long (0 = always re-check)
    #[serde(with = "humantime_serde")]
    pub verify_interval: Duration,
}

/// External tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// libgpiod `gpioset`
    pub gpioset: String,
    /// OpenSSH client
    pub ssh: String,
    /// OpenSSH copy tool
    pub scp: String,
    /// Extra arguments passed to both `ssh` and `scp`
    pub ssh_options: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            gpioset: "gpioset".to_string(),
            ssh: "ssh".to_string(),
            scp: "scp".to_string(),
            ssh_options: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Default configuration file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rust_bench").join("config.toml"))
    }

    /// Load from the default location and the environment.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load() -> Result<Self, figment::Error> {
        match Self::default_path() {
            Some(path) => Self::load_from(path),
            None => Self::figment(None).extract(),
        }
    }

    /// Load from a specific file path and the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Self::figment(Some(path.as_ref())).extract()
    }

    fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        for (name, tool) in [
            ("gpioset", &self.tools.gpioset),
            ("ssh", &self.tools.ssh),
            ("scp", &self.tools.scp),
        ] {
            if tool.trim().is_empty() {
                return Err(format!("Tool '{}' must not be empty", name));
            }
        }

        Ok(())
    }

    /// OpenSSH settings for remote staging.
    pub fn ssh_config(&self) -> SshConfig {
        SshConfig {
            ssh: self.tools.ssh.clone(),
            scp: self.tools.scp.clone(),
            options: self.tools.ssh_options.clone(),
        }
    }

    /// Registry options derived from this configuration.
    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            verify_interval: self.staging.verify_interval,
            gpio_tools: GpioTools {
                gpioset: self.tools.gpioset.clone(),
                ssh: self.tools.ssh.clone(),
            },
            ssh: self.ssh_config(),
            ..RegistryOptions::default()
        }
    }
}
