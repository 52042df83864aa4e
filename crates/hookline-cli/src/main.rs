//! hookline - Command-line tool for CAN device fleets
//!
//! Talks to a `hooklined` daemon: lists providers and devices, runs device
//! operations, captures and replays bus traffic and flashes firmware.

mod commands;
mod config;
mod output;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hookline_client::{DeviceId, HttpTransport, ProviderSet};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Config, MergedConfig};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "hookline")]
#[command(author, version, about = "CAN device fleet CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Daemon URL
    #[arg(short, long, env = "HOOKLINE_SERVER")]
    server: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "HOOKLINE_CONFIG")]
    config: Option<PathBuf>,

    /// Provider address for device commands
    #[arg(short, long, env = "HOOKLINE_PROVIDER")]
    provider: Option<String>,

    /// Device domain
    #[arg(short, long)]
    domain: Option<String>,

    /// Output format
    #[arg(short = 'f', long, value_enum)]
    format: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List providers
    Providers,

    /// Connect a provider
    Connect {
        /// Provider address
        address: String,
    },

    /// Disconnect a provider
    Disconnect {
        /// Provider address
        address: String,
    },

    /// List a provider's devices
    Devices {
        /// Provider address (defaults to --provider)
        address: Option<String>,
    },

    /// Flash a device's status light
    Blink {
        /// Device id: a serial, `Serial(5)` or `Dfu(5)`
        device: DeviceId,
    },

    /// Change a device's CAN id (0-62)
    SetId {
        device: DeviceId,
        id: u8,
    },

    /// Change a device's name (up to 16 characters)
    SetName {
        device: DeviceId,
        name: String,
    },

    /// Persist id and name changes
    Commit {
        device: DeviceId,
    },

    /// Capture live bus traffic through a CAN bridge
    Capture {
        /// The bridge's device id
        bridge: DeviceId,

        /// Export captured packets on exit (.csv or .json)
        #[arg(long)]
        export: Option<PathBuf>,

        /// Only keep frames the bridge could decode
        #[arg(long)]
        decoded_only: bool,

        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<f64>,

        /// Poll interval in milliseconds
        #[arg(long, default_value = "50")]
        interval: u64,
    },

    /// Replay a CSV capture through a CAN bridge
    Replay {
        /// The bridge's device id
        bridge: DeviceId,

        /// Capture file (CSV)
        file: PathBuf,
    },

    /// Flash firmware to a device
    Flash {
        device: DeviceId,

        /// Firmware image path
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    let merged = config.merge_with_args(
        cli.server.as_deref(),
        cli.provider.as_deref(),
        cli.domain.as_deref(),
        cli.no_color,
    );
    let format = cli
        .format
        .or_else(|| {
            config
                .output
                .as_deref()
                .and_then(|s| OutputFormat::from_str(s, true).ok())
        })
        .unwrap_or_default();
    let ctx = OutputContext::new(format, merged.no_color, cli.quiet);

    let providers = create_providers(&merged.server)?;

    match cli.command {
        Commands::Providers => commands::providers(&providers, &ctx).await?,

        Commands::Connect { address } => commands::connect(&providers, &address, &ctx).await?,

        Commands::Disconnect { address } => commands::disconnect(&providers, &address, &ctx).await?,

        Commands::Devices { address } => {
            let address = match address {
                Some(address) => address,
                None => merged.provider()?.to_string(),
            };
            commands::devices(&providers, &address, &ctx).await?;
        }

        Commands::Blink { device } => {
            let driver = resolve(&providers, &merged, device).await?;
            commands::blink(&driver, &ctx).await?;
        }

        Commands::SetId { device, id } => {
            let driver = resolve(&providers, &merged, device).await?;
            commands::set_id(&driver, id, &ctx).await?;
        }

        Commands::SetName { device, name } => {
            let driver = resolve(&providers, &merged, device).await?;
            commands::set_name(&driver, &name, &ctx).await?;
        }

        Commands::Commit { device } => {
            let driver = resolve(&providers, &merged, device).await?;
            commands::commit(&driver, &ctx).await?;
        }

        Commands::Capture {
            bridge,
            export,
            decoded_only,
            duration,
            interval,
        } => {
            let driver = resolve(&providers, &merged, bridge).await?;
            let duration = duration
                .map(Duration::try_from_secs_f64)
                .transpose()
                .context("Invalid --duration")?;
            commands::capture(
                driver,
                decoded_only,
                duration,
                Duration::from_millis(interval.max(1)),
                export.as_deref(),
                &ctx,
            )
            .await?;
        }

        Commands::Replay { bridge, file } => {
            let driver = resolve(&providers, &merged, bridge).await?;
            commands::replay(driver, &file, &ctx).await?;
        }

        Commands::Flash { device, file } => {
            commands::flash(&providers, merged.provider()?, &merged.domain, device, &file, &ctx).await?;
        }
    }

    Ok(())
}

/// Create the router root for the given daemon URL
fn create_providers(server: &str) -> Result<ProviderSet> {
    let transport = HttpTransport::new(server).context("Failed to create HTTP transport")?;
    Ok(ProviderSet::new(Arc::new(transport)))
}

async fn resolve(
    providers: &ProviderSet,
    merged: &MergedConfig,
    device: DeviceId,
) -> Result<hookline_client::DeviceDriver> {
    commands::resolve(providers, merged.provider()?, &merged.domain, device).await
}
