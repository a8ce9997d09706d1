//! CLI Handling module

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    PortTrackError, PortTypeFilter,
    channel::SshChannel,
    config::AppConfig,
    export::{HostRow, export_csv, format_table, to_json},
    inventory::Inventory,
    locate::validate_addresses,
    subnet::expand,
    tracker::{HostTracker, TrackerOptions},
};

/// PortTrack - find the switch port an address is plugged into
#[derive(Parser)]
#[command(name = "porttrack")]
#[command(about = "Locate hosts on switch ports from router ARP and switch MAC tables")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Enable debug logging (shows detailed SSH and parsing information)
    #[arg(short, long, global = true)]
    debug: bool,

    /// Path to the configuration file
    #[arg(
        short = 'c',
        long = "config",
        default_value = "porttrack.json",
        global = true
    )]
    config_path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct OutputArgs {
    /// Which ports to report
    #[arg(short, long, value_enum, default_value_t = PortTypeFilter::Access)]
    port_type: PortTypeFilter,
    /// Write the results to this CSV file
    #[arg(short, long)]
    export: Option<PathBuf>,
    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one collection cycle and print any device errors
    Load,
    /// Find the switch ports one or more addresses are attached to
    Track {
        #[arg(required = true)]
        addresses: Vec<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Find every host of a subnet that is attached to a switch port
    Subnet {
        /// Subnet in CIDR form, e.g. 10.0.0.0/24
        cidr: String,
        /// Addresses to leave out
        #[arg(short = 'x', long)]
        exclude: Vec<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Track addresses and run show commands on the ports they are found on
    Command {
        #[arg(required = true)]
        addresses: Vec<String>,
        /// Command template, `{}` is replaced with the port name
        #[arg(short = 'C', long = "command", required = true)]
        commands: Vec<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
}

pub async fn main_func() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let env_filter_str = if cli.debug { "debug" } else { "info" };

    let env_filter = EnvFilter::new(format!(
        "{env_filter_str},russh::client=info,russh::sshbuffer=info"
    ));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(cli.debug)
                .with_thread_ids(false)
                .with_level(true),
        )
        .with(env_filter)
        .init();

    let config = load_or_create_config(&cli.config_path)?;
    info!("Found {} devices in configuration", config.devices.len());

    let tracker = HostTracker::new(
        Inventory::from_config(&config),
        Arc::new(SshChannel::new(
            config.ssh_port,
            Duration::from_secs(config.ssh_timeout_seconds),
        )),
        TrackerOptions::from(&config),
    );

    match cli.command {
        Commands::Load => {
            let errors = tracker.load().await?;
            if errors.is_empty() {
                println!("Collection finished with no device errors");
            }
            for message in errors {
                println!("{message}");
            }
        }
        Commands::Track { addresses, output } => {
            validate_addresses(&addresses)?;
            tracker.load().await?;
            let rows = tracker.track_hosts(&addresses, output.port_type).await?;
            emit(&rows, &output)?;
        }
        Commands::Subnet {
            cidr,
            exclude,
            output,
        } => {
            expand(&cidr, &exclude)?;
            tracker.load().await?;
            let rows = tracker
                .track_subnet(&cidr, output.port_type, &exclude)
                .await?;
            emit(&rows, &output)?;
        }
        Commands::Command {
            addresses,
            commands,
            output,
        } => {
            validate_addresses(&addresses)?;
            tracker.load().await?;
            let rows = tracker
                .track_with_commands(&addresses, &commands, output.port_type)
                .await?;
            emit(&rows, &output)?;
        }
    }

    Ok(())
}

fn load_or_create_config(config_path: &Path) -> Result<AppConfig, PortTrackError> {
    match AppConfig::load_from_file(config_path) {
        Ok(config) => {
            info!("Loaded configuration from {}", config_path.display());
            Ok(config)
        }
        Err(err) if config_path.exists() => {
            error!(
                "Error loading existing config file '{}': {}",
                config_path.display(),
                err
            );
            Err(PortTrackError::Config(format!(
                "Config file exists but cannot be loaded: {err}"
            )))
        }
        Err(_) => {
            info!(
                "Config file '{}' not found, creating default configuration",
                config_path.display()
            );
            let config = AppConfig::default();
            config.save_to_file(config_path)?;
            warn!(
                "Created default config at '{}' - add your routers and switches to it",
                config_path.display()
            );
            Ok(config)
        }
    }
}

fn emit(rows: &[HostRow], output: &OutputArgs) -> Result<(), PortTrackError> {
    if let Some(path) = &output.export {
        export_csv(rows, path)?;
        println!("Wrote {} row(s) to {}", rows.len(), path.display());
    }
    if output.json {
        println!("{}", to_json(rows)?);
    } else if rows.is_empty() {
        println!("No hosts found");
    } else {
        println!("{}", format_table(rows));
    }
    Ok(())
}
