//! `cryoctl`: command-line control of an s-series Cryostation.
//!
//! Talks to the instrument's REST property tree directly, or to the
//! in-memory mock with `--mock`. Every subcommand is one instrument
//! operation; errors propagate to the exit status unmodified.
//!
//! ```text
//! cryoctl --host 192.168.1.123 status
//! cryoctl --host 192.168.1.123 target 3.1
//! cryoctl --host 192.168.1.123 cooldown
//! cryoctl --mock get /controller/properties/platformTargetTemperature
//! cryoctl devices --config config/cryostat.toml
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cryo_driver_cryostation::{CryostationDriver, DEFAULT_PORT};
use cryo_hardware::{default_registry, register_from_file};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cryoctl", version, about = "Cryostation REST control CLI")]
struct Cli {
    /// Hostname or IP address of the Cryostation controller
    #[arg(long, global = true)]
    host: Option<String>,

    /// REST port of the controller
    #[arg(long, global = true, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Use the in-memory mock instrument instead of hardware
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show temperatures, setpoint, stability, and chamber pressure
    Status,

    /// Read the platform temperature once, in kelvin
    Read,

    /// GET a raw property path and print its envelope
    Get {
        /// Property path, e.g. /controller/properties/platformTargetTemperature
        path: String,
    },

    /// PUT a value to a raw property path
    Set {
        /// Property path
        path: String,
        /// Value (parsed as JSON, falling back to a bare string)
        value: String,
    },

    /// Set the platform target temperature
    Target {
        /// Setpoint in kelvin
        kelvin: f64,
    },

    /// Start a cooldown
    Cooldown,

    /// Start a warmup
    Warmup,

    /// Vent the sample chamber
    Vent,

    /// Pump the sample chamber down
    PullVacuum,

    /// Abort the active system goal
    Abort,

    /// List the devices declared in a TOML device file
    Devices {
        /// Path to the device file
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::Devices { config } => list_devices(config).await,
        _ => run_instrument_command(&cli).await,
    }
}

/// Connect to the instrument named by the CLI flags.
async fn connect(cli: &Cli) -> Result<Arc<CryostationDriver>> {
    if cli.mock {
        return CryostationDriver::new_async("mock", cli.port, true).await;
    }

    let host = cli
        .host
        .as_deref()
        .context("--host is required unless --mock is set")?;
    CryostationDriver::new_async(host, cli.port, false).await
}

async fn run_instrument_command(cli: &Cli) -> Result<()> {
    let cryo = connect(cli).await?;

    match &cli.command {
        Command::Status => {
            let platform = cryo.get_platform_temperature_sample().await?;
            let target = cryo.get_platform_target_temperature().await?;
            let sample = cryo.get_sample_temperature().await?;
            let pressure = cryo.get_sample_chamber_pressure().await?;

            println!(
                "Platform:  {:9.3} K  (target {:.3} K, rate {:+.2} K/min)",
                platform.temperature, target, platform.temperature_slope
            );
            println!(
                "Stability: {:9.3} K  (stable: {})",
                platform.temperature_stability,
                if platform.temperature_stability_ok && platform.temperature_stable {
                    "yes"
                } else {
                    "no"
                }
            );
            println!("Sample:    {:9.3} K", sample);
            println!("Pressure:  {:9.3e} torr", pressure);
        }
        Command::Read => {
            println!("{}", cryo.get_platform_temperature().await?);
        }
        Command::Get { path } => {
            let envelope = cryo.get_prop(path).await?;
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        Command::Set { path, value } => {
            let value: Value = serde_json::from_str(value)
                .unwrap_or_else(|_| Value::String(value.clone()));
            let response = cryo.set_prop(path, value).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Target { kelvin } => {
            cryo.set_platform_target_temperature(*kelvin).await?;
            println!("Platform target set to {} K", kelvin);
        }
        Command::Cooldown => {
            cryo.cooldown().await?;
            println!("Cooldown started");
        }
        Command::Warmup => {
            cryo.warmup().await?;
            println!("Warmup started");
        }
        Command::Vent => {
            cryo.vent().await?;
            println!("Vent started");
        }
        Command::PullVacuum => {
            cryo.pull_vacuum().await?;
            println!("Pull vacuum started");
        }
        Command::Abort => {
            cryo.abort_goal().await?;
            println!("System goal aborted");
        }
        Command::Devices { .. } => unreachable!("handled in main"),
    }

    Ok(())
}

/// Register everything in the device file and print what came up.
async fn list_devices(config: &PathBuf) -> Result<()> {
    let mut registry = default_registry();
    register_from_file(&mut registry, config).await?;

    for device in registry.list_devices() {
        let caps: Vec<&str> = device.capabilities.iter().map(|c| c.name()).collect();
        println!(
            "{:<16} {:<32} {:<14} [{}]",
            device.id,
            device.name,
            device.driver_type,
            caps.join(", ")
        );
    }

    Ok(())
}
