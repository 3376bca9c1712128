use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use vdp_serial::devices::{ports, SerialConfig, SerialDevice, DEFAULT_BAUD_RATE};
use vdp_serial::registry::{Registry, RegistryConfig};
use vdp_serial::types::flatten;

/// Listens to a VDP debug link and logs every channel it learns
#[derive(Parser, Debug)]
#[command(name = "vdp-monitor", version)]
struct Args {
    /// Serial port to open. Defaults to the first USB serial port found.
    #[arg(short, long)]
    port: Option<String>,

    /// Line speed in bits per second
    #[arg(short, long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// List candidate serial ports and exit
    #[arg(long)]
    list: bool,

    /// Do not acknowledge received broadcasts
    #[arg(long)]
    no_ack: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    // Get the candidate ports
    if args.list {
        for port in ports::discover_ports()? {
            println!("{port}");
        }
        return Ok(());
    }

    let port_name = match args.port {
        Some(p) => p,
        None => ports::discover_ports()?
            .into_iter()
            .next()
            .map(|p| p.port_name)
            .context("No USB serial port found, pass one with --port")?,
    };

    let config = SerialConfig {
        baud_rate: args.baud,
        ..SerialConfig::new(port_name)
    };
    let device = Arc::new(
        SerialDevice::open(&config).with_context(|| format!("Failed to open {}", config.port_name))?,
    );

    let registry = Registry::with_config(
        device,
        RegistryConfig {
            acknowledge_broadcasts: !args.no_ack,
        },
    );

    registry.install_broadcast_callback(|channel| {
        tracing::info!("New channel {}:\n{}", channel.id(), channel.data().pretty_print());
    });

    registry.install_data_callback(|channel| {
        for (path, value) in flatten(channel.data()) {
            tracing::info!(channel = channel.id(), "{path} = {value}");
        }
    });

    tracing::info!("Listening on {}, press Ctrl-C to stop", config.port_name);
    tokio::signal::ctrl_c().await?;

    tracing::info!("Saw {} channel(s)", registry.remote_channels().len());
    Ok(())
}
