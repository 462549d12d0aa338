//! Digital output over libgpiod command-line tools.
//!
//! `set` runs `gpioset -t0 -c <chip> <pin>=<0|1>`; lines on an exporter host
//! run the same command behind `ssh <host> --`. Reading a line back is not
//! supported: `get` logs a warning and reports `false`.

use async_trait::async_trait;
use bench_core::{
    format_command, Binding, BenchError, BenchResult, CommandRunner, DigitalOutput, Driver,
    DriverState, GpioLine, ProcessRunner, ResourceKind,
};
use std::sync::Arc;

/// Resource kinds a GPIO driver can bind.
pub const GPIO_KINDS: &[ResourceKind] = &[
    ResourceKind::GpiodGpio,
    ResourceKind::RawGpiodGpio,
    ResourceKind::NetworkGpiodGpio,
    ResourceKind::UsbGpiodGpio,
];

/// External tool names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpioTools {
    /// `gpioset` binary
    pub gpioset: String,
    /// `ssh` binary for network lines
    pub ssh: String,
}

impl Default for GpioTools {
    fn default() -> Self {
        Self {
            gpioset: "gpioset".to_string(),
            ssh: "ssh".to_string(),
        }
    }
}

/// Drives one GPIO line as a digital output.
pub struct GpiodDigitalOutputDriver {
    binding: Binding<dyn GpioLine>,
    tools: GpioTools,
    runner: Arc<dyn CommandRunner>,
}

impl GpiodDigitalOutputDriver {
    /// Unbound driver spawning real processes.
    pub fn new(name: impl Into<String>, tools: GpioTools) -> Self {
        Self::with_runner(name, tools, Arc::new(ProcessRunner))
    }

    /// Unbound driver using `runner` for command execution.
    pub fn with_runner(
        name: impl Into<String>,
        tools: GpioTools,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            binding: Binding::new(name, GPIO_KINDS),
            tools,
            runner,
        }
    }

    /// Attach `line`.
    pub fn bind(&self, line: Arc<dyn GpioLine>) -> BenchResult<()> {
        self.binding.bind(line)
    }

    /// Detach the line, deactivating first if needed.
    pub fn unbind(&self) -> Option<Arc<dyn GpioLine>> {
        self.binding.unbind()
    }

    /// Bound, active line with a known chip.
    fn usable_line(&self) -> BenchResult<(Arc<dyn GpioLine>, String)> {
        let line = self.binding.check_active()?;
        if !line.avail() {
            return Err(BenchError::ResourceUnavailable {
                resource: line.name().to_string(),
                reason: "no matching device present".to_string(),
            });
        }
        let chip = line.chip().ok_or_else(|| {
            BenchError::Configuration(format!("GPIO resource '{}' has no chip", line.name()))
        })?;
        Ok((line, chip))
    }

    /// Command line that drives `line` to `status`.
    pub fn command(&self, line: &dyn GpioLine, chip: &str, status: bool) -> Vec<String> {
        let mut argv = Vec::new();
        if let Some(host) = line.host() {
            argv.extend([self.tools.ssh.clone(), host.to_string(), "--".to_string()]);
        }
        argv.extend([
            self.tools.gpioset.clone(),
            "-t0".to_string(),
            "-c".to_string(),
            chip.to_string(),
            format!("{}={}", line.pin(), u8::from(status)),
        ]);
        argv
    }
}

#[async_trait]
impl DigitalOutput for GpiodDigitalOutputDriver {
    async fn set(&self, status: bool) -> BenchResult<()> {
        let (line, chip) = self.usable_line()?;
        let argv = self.command(line.as_ref(), &chip, status);
        tracing::info!(
            driver = self.binding.driver_name(),
            resource = line.name(),
            status,
            command = %format_command(&argv),
            "set"
        );
        self.runner.check_output(&argv).await?;
        Ok(())
    }

    async fn get(&self) -> BenchResult<bool> {
        self.usable_line()?;
        tracing::warn!(driver = self.binding.driver_name(), "'get' is not supported");
        Ok(false)
    }
}

#[async_trait]
impl Driver for GpiodDigitalOutputDriver {
    fn name(&self) -> &str {
        self.binding.driver_name()
    }

    fn accepts(&self) -> &'static [ResourceKind] {
        self.binding.accepts()
    }

    fn state(&self) -> DriverState {
        self.binding.state()
    }

    async fn activate(&self) -> BenchResult<()> {
        self.binding.activate()
    }

    async fn deactivate(&self) -> BenchResult<()> {
        self.binding.deactivate();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::{GpiodGpio, NetworkGpiodGpio, UsbGpiodGpio};
    use crate::matcher::{DeviceMatcher, DiscoveredDevice, MatchSpec};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        async fn check_output(&self, argv: &[String]) -> BenchResult<Vec<u8>> {
            self.calls.lock().push(argv.to_vec());
            if self.fail {
                return Err(BenchError::CommandFailed {
                    command: format_command(argv),
                    reason: "exit status: 1".to_string(),
                });
            }
            Ok(Vec::new())
        }
    }

    struct NoDevices;

    impl DeviceMatcher for NoDevices {
        fn enumerate(&self) -> BenchResult<Vec<DiscoveredDevice>> {
            Ok(Vec::new())
        }
    }

    async fn active(
        line: Arc<dyn GpioLine>,
        runner: Arc<RecordingRunner>,
    ) -> GpiodDigitalOutputDriver {
        let driver = GpiodDigitalOutputDriver::with_runner("power", GpioTools::default(), runner);
        driver.bind(line).unwrap();
        driver.activate().await.unwrap();
        driver
    }

    #[tokio::test]
    async fn test_set_runs_gpioset() {
        let runner = Arc::new(RecordingRunner::default());
        let line = Arc::new(GpiodGpio::new("power", Some("/dev/gpiochip0".into()), 5));
        let driver = active(line, runner.clone()).await;

        driver.set(true).await.unwrap();
        driver.set(false).await.unwrap();

        let calls = runner.calls.lock();
        assert_eq!(calls[0], ["gpioset", "-t0", "-c", "/dev/gpiochip0", "5=1"]);
        assert_eq!(calls[1], ["gpioset", "-t0", "-c", "/dev/gpiochip0", "5=0"]);
    }

    #[tokio::test]
    async fn test_network_line_runs_over_ssh() {
        let runner = Arc::new(RecordingRunner::default());
        let line = Arc::new(NetworkGpiodGpio::new("relay", "exporter", "gpiochip1", 7).unwrap());
        let driver = active(line, runner.clone()).await;

        driver.set(true).await.unwrap();
        assert_eq!(
            runner.calls.lock()[0],
            ["ssh", "exporter", "--", "gpioset", "-t0", "-c", "gpiochip1", "7=1"]
        );
    }

    #[tokio::test]
    async fn test_get_is_a_sentinel() {
        let runner = Arc::new(RecordingRunner::default());
        let line = Arc::new(GpiodGpio::new("power", Some("/dev/gpiochip0".into()), 5));
        let driver = active(line, runner.clone()).await;

        assert!(!driver.get().await.unwrap());
        assert!(runner.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_guards_and_failures() {
        let runner = Arc::new(RecordingRunner {
            fail: true,
            ..RecordingRunner::default()
        });
        let driver =
            GpiodDigitalOutputDriver::with_runner("power", GpioTools::default(), runner.clone());
        assert!(matches!(driver.set(true).await, Err(BenchError::NotBound { .. })));

        driver
            .bind(Arc::new(GpiodGpio::new("power", Some("/dev/gpiochip0".into()), 5)))
            .unwrap();
        assert!(matches!(driver.get().await, Err(BenchError::NotActive { .. })));

        driver.activate().await.unwrap();
        assert!(matches!(
            driver.set(true).await,
            Err(BenchError::CommandFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_chip() {
        let runner = Arc::new(RecordingRunner::default());
        let driver = active(Arc::new(GpiodGpio::new("power", None, 5)), runner.clone()).await;
        assert!(matches!(
            driver.set(true).await,
            Err(BenchError::Configuration(_))
        ));
        assert!(runner.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unmatched_usb_line_is_unavailable() {
        let runner = Arc::new(RecordingRunner::default());
        let line = Arc::new(UsbGpiodGpio::new("usb", 0, MatchSpec::new(), Arc::new(NoDevices)));
        let driver = active(line, runner.clone()).await;

        assert!(matches!(
            driver.set(true).await,
            Err(BenchError::ResourceUnavailable { .. })
        ));
        assert!(matches!(
            driver.get().await,
            Err(BenchError::ResourceUnavailable { .. })
        ));
        assert!(runner.calls.lock().is_empty());
    }
}
