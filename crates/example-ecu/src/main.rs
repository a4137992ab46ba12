//! Example ECU Simulator
//!
//! Answers GMLAN requests on a real or virtual SocketCAN interface, for
//! exercising `gmlan-cli` without a module on the bench.
//!
//! # Usage
//!
//! ```bash
//! ./example-ecu --interface vcan0 --family e38
//! ./example-ecu --config ecu.toml
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use example_ecu::simulator::serve;
use example_ecu::{SimConfig, SimulatedEcu};
use gmlan::{open_transport, EcuFamily, TransportConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "example-ecu")]
#[command(about = "Simulated GMLAN module for gmlan-cli development")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: Option<String>,

    /// CAN interface name
    #[arg(short, long, default_value = "vcan0")]
    interface: String,

    /// Module family, overriding the config file
    #[arg(long)]
    family: Option<EcuFamily>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("example_ecu=debug,gmlan=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "example_ecu=info,gmlan=warn".into())
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from: {}", path);
            SimConfig::load(path).with_context(|| format!("Failed to load config {}", path))?
        }
        None => SimConfig::default(),
    };
    if let Some(family) = args.family {
        config.family = family;
    }
    if config.faults != Default::default() {
        warn!(faults = ?config.faults, "Fault injection active");
    }

    let ecu = SimulatedEcu::from_config(&config)?;
    let settings = ecu.settings();
    info!(
        interface = %args.interface,
        family = %config.family,
        rx_id = %format!("0x{:03X}", settings.rx_id),
        tx_id = %format!("0x{:03X}", settings.tx_id),
        "Starting ECU simulator"
    );

    let transport = open_transport(&TransportConfig::SocketCan {
        interface: args.interface.clone(),
    })?;

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;

    info!("ECU Simulator ready - waiting for requests");
    info!("Press Ctrl+C to stop");
    serve(&ecu, transport, settings, &running);

    info!(requests = ecu.requests_handled(), "ECU Simulator stopped");
    Ok(())
}
