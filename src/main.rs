//! CLI entry point for awc-logger
//!
//! # Usage
//!
//! Record every configured controller until Ctrl-C:
//! ```bash
//! awc-logger run
//! ```
//!
//! Record a subset, with an alternative configuration file:
//! ```bash
//! awc-logger --config lab.toml run --device AWC1
//! ```
//!
//! Validate the configuration, or list what has been recorded so far:
//! ```bash
//! awc-logger check
//! awc-logger segments --device AWC2
//! ```

use anyhow::{Context, Result};
use awc_logger::config::{Settings, DEFAULT_CONFIG_PATH};
use awc_logger::link::TelnetConnector;
use awc_logger::logging::{self, OutputFormat, TracingConfig};
use awc_logger::recorder::list_segments;
use awc_logger::{shutdown, DeviceId, Orchestrator, TaskExit};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "awc-logger")]
#[command(about = "Records AWC controller streams into rotating files", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Console log format (overrides the configuration)
    #[arg(long, global = true, value_enum)]
    log_format: Option<OutputFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire from the configured devices until interrupted
    Run {
        /// Only record these devices
        #[arg(long = "device")]
        devices: Vec<String>,
    },

    /// Load and validate the configuration, then print it
    Check,

    /// List recorded segments in order
    Segments {
        /// Only list these devices
        #[arg(long = "device")]
        devices: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load_from(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    let mut tracing_config = TracingConfig::from_settings(&settings)?;
    if let Some(format) = cli.log_format {
        tracing_config = tracing_config.with_format(format);
    }
    logging::init(tracing_config)?;

    match cli.command {
        Commands::Run { devices } => run(settings.select_devices(&devices)?).await,
        Commands::Check => check(&settings),
        Commands::Segments { devices } => segments(&settings.select_devices(&devices)?),
    }
}

async fn run(settings: Settings) -> Result<()> {
    let connector = TelnetConnector::from_config(&settings.link);
    let (trigger, signal) = shutdown::channel();

    info!(
        devices = settings.devices.len(),
        output_dir = %settings.storage.output_dir.display(),
        "Starting acquisition"
    );
    let fleet = Orchestrator::new(settings, connector).spawn(&signal);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupt received, stopping"),
            Err(err) => warn!(error = %err, "Cannot listen for Ctrl-C, stopping"),
        }
        trigger.trigger();
    });

    let exits = fleet.join().await;
    let failed: Vec<&DeviceId> = exits
        .iter()
        .filter(|(_, exit)| !matches!(exit, TaskExit::Stopped))
        .map(|(id, _)| id)
        .collect();

    for (id, exit) in &exits {
        match exit {
            TaskExit::Stopped => info!(device = %id, "Stopped"),
            TaskExit::Failed(err) => error!(device = %id, error = %err, "Stopped with error"),
            TaskExit::Panicked(msg) => error!(device = %id, panic = %msg, "Task panicked"),
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        let names: Vec<&str> = failed.iter().map(|id| id.as_str()).collect();
        anyhow::bail!("acquisition failed for {}", names.join(", "))
    }
}

fn check(settings: &Settings) -> Result<()> {
    let rendered = toml::to_string_pretty(settings).context("rendering settings")?;
    println!("# Configuration is valid");
    println!("{rendered}");
    Ok(())
}

fn segments(settings: &Settings) -> Result<()> {
    let namer = settings.namer();
    for device in settings.devices() {
        let entries = list_segments(&namer, &device.id)
            .with_context(|| format!("listing {}", namer.folder().display()))?;
        println!("{} ({} segments)", device.id, entries.len());
        for entry in entries {
            println!("  {}  {}", entry.window_start.to_rfc3339(), entry.path.display());
        }
    }
    Ok(())
}
