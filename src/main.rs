//! CLI entry point for rust_bench
//!
//! Loads the application configuration and a bench description, builds the
//! registry, and runs one command against it.
//!
//! # Usage
//!
//! ```bash
//! rust_bench resources
//! rust_bench stage tftp ./zImage
//! rust_bench export-vars nfs
//! rust_bench gpio set power on
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rust_bench::bench_hardware::config::{default_bench_path, load_bench_config};
use rust_bench::bench_hardware::BenchRegistry;
use rust_bench::config::AppConfig;
use rust_bench::tracing_setup;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rust_bench")]
#[command(about = "Stage files and switch GPIO lines on a test bench", long_about = None)]
struct Cli {
    /// Application configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bench description file
    #[arg(long, global = true)]
    bench: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List resources and drivers
    Resources {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Stage a file through a provider driver and print its locator
    Stage {
        /// Driver name
        driver: String,

        /// Local file to stage
        file: PathBuf,

        /// Print the locator as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the export variables of a provider driver
    ExportVars {
        /// Driver name
        driver: String,
    },

    /// Drive GPIO outputs
    Gpio {
        #[command(subcommand)]
        action: GpioCommand,
    },
}

#[derive(Subcommand)]
enum GpioCommand {
    /// Switch a line
    Set {
        /// Driver name
        driver: String,

        /// Target state
        state: LineState,
    },

    /// Read a line back
    Get {
        /// Driver name
        driver: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LineState {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => AppConfig::load().context("Failed to load config")?,
    };
    if let Some(level) = &cli.log_level {
        config.application.log_level = level.clone();
    }
    config.validate().map_err(|e| anyhow!(e))?;
    tracing_setup::init_from_config(&config).map_err(|e| anyhow!(e))?;

    let bench_path = cli
        .bench
        .clone()
        .or_else(|| config.application.bench.clone())
        .or_else(default_bench_path)
        .ok_or_else(|| anyhow!("No bench description given and no config directory found"))?;
    let bench = load_bench_config(&bench_path)?;
    let registry = BenchRegistry::from_config(&bench, config.registry_options())
        .with_context(|| format!("Failed to build bench from {}", bench_path.display()))?;

    let outcome = run(&registry, cli.command).await;
    registry.deactivate_all().await?;
    outcome
}

async fn run(registry: &BenchRegistry, command: Commands) -> Result<()> {
    match command {
        Commands::Resources { json } => list(registry, json).await,
        Commands::Stage { driver, file, json } => stage(registry, &driver, &file, json).await,
        Commands::ExportVars { driver } => {
            let stager = registry
                .get_stager(&driver)
                .ok_or_else(|| anyhow!("'{}' is not a provider driver", driver))?;
            let vars = stager.get_export_vars()?;
            println!("{}", serde_json::to_string_pretty(&vars)?);
            Ok(())
        }
        Commands::Gpio { action } => gpio(registry, action).await,
    }
}

async fn list(registry: &BenchRegistry, json: bool) -> Result<()> {
    let failures = registry.update_resources().await;
    if failures > 0 {
        tracing::warn!(failures, "some resources could not be updated");
    }

    let resources = registry.list_resources();
    let drivers = registry.list_drivers();

    if json {
        let listing = serde_json::json!({ "resources": resources, "drivers": drivers });
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("{:<20} {:<24} AVAIL", "RESOURCE", "KIND");
    for r in &resources {
        println!("{:<20} {:<24} {}", r.name, r.kind.to_string(), r.avail);
    }
    println!();
    println!("{:<20} {:<30} {:<20} STATE", "DRIVER", "KIND", "RESOURCE");
    for d in &drivers {
        println!(
            "{:<20} {:<30} {:<20} {:?}",
            d.name, d.kind, d.resource, d.state
        );
    }
    Ok(())
}

async fn stage(registry: &BenchRegistry, driver: &str, file: &Path, json: bool) -> Result<()> {
    let stager = registry
        .get_stager(driver)
        .ok_or_else(|| anyhow!("'{}' is not a provider driver", driver))?;
    registry.activate(driver).await?;

    let locator = stager
        .stage(file)
        .await
        .with_context(|| format!("Failed to stage {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string(&locator)?);
    } else {
        println!("{}", locator);
    }
    Ok(())
}

async fn gpio(registry: &BenchRegistry, action: GpioCommand) -> Result<()> {
    let driver = match &action {
        GpioCommand::Set { driver, .. } | GpioCommand::Get { driver } => driver.as_str(),
    };
    let output = registry
        .get_digital_output(driver)
        .ok_or_else(|| anyhow!("'{}' is not a digital output driver", driver))?;
    registry.activate(driver).await?;

    match action {
        GpioCommand::Set { state, .. } => {
            output.set(matches!(state, LineState::On)).await?;
        }
        GpioCommand::Get { .. } => {
            let high = output.get().await?;
            println!("{}", if high { "on" } else { "off" });
        }
    }
    Ok(())
}
