//! GMLAN CLI - Command-line tool for GMLAN module diagnostics
//!
//! Talks to a module over SocketCAN, or to an in-process simulated module
//! when no CAN hardware is around.
//!
//! ```bash
//! gmlan-cli info
//! gmlan-cli --ecu e67 --interface can0 dump --address 0 --length 0x200000 --out e67.bin
//! gmlan-cli verify e67.bin --fix
//! ```

mod commands;
mod config;
mod connection;
mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use example_ecu::SimConfig;
use gmlan::events::default_sink;
use gmlan::{EcuFamily, GmlanConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::commands::{parse_identifier, parse_number};
use crate::config::{Config, TransportKind};
use crate::connection::Connection;
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "gmlan-cli")]
#[command(author, version, about = "GMLAN Module Diagnostics CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "GMLAN_CONFIG")]
    config: Option<PathBuf>,

    /// ECU family: e38, e67, t43, generic
    #[arg(short, long, env = "GMLAN_ECU")]
    ecu: Option<EcuFamily>,

    /// Frame transport
    #[arg(short, long, value_enum)]
    transport: Option<TransportKind>,

    /// SocketCAN interface (implies --transport socketcan)
    #[arg(short, long)]
    interface: Option<String>,

    /// Simulator configuration for the sim transport
    #[arg(long)]
    sim_config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,

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
    /// Read module identifiers
    Info {
        /// Identifiers to read (hex, comma separated); defaults to the family's list
        #[arg(long, value_delimiter = ',', value_parser = parse_identifier)]
        ids: Vec<u8>,

        /// Probe every identifier from 0x00 to 0xFF
        #[arg(long, conflicts_with = "ids")]
        all: bool,
    },

    /// Read one identifier
    ReadId {
        /// Identifier (hex)
        #[arg(value_parser = parse_identifier)]
        id: u8,

        /// Print the payload as hex
        #[arg(long)]
        raw: bool,
    },

    /// List or clear failure records
    Dtc {
        /// Clear diagnostic information instead of listing
        #[arg(long)]
        clear: bool,
    },

    /// Report the programmed state
    State,

    /// Security access with a precomputed key
    Unlock {
        /// Seed request level; the key goes to level + 1
        #[arg(long, default_value = "1", value_parser = parse_level)]
        level: u8,

        /// Key algorithm mode, passed through to key derivation
        #[arg(long, default_value = "0", value_parser = parse_level)]
        mode: u8,

        /// Security key (hex string, e.g., "1A2B")
        #[arg(long)]
        key: String,
    },

    /// Read memory into a file
    Dump {
        /// Start address
        #[arg(long, value_parser = parse_number)]
        address: u32,

        /// Number of bytes
        #[arg(long, value_parser = parse_number)]
        length: u32,

        /// Bytes per ReadMemoryByAddress request
        #[arg(long, value_parser = parse_block_size)]
        block_size: Option<u16>,

        /// Output file
        #[arg(long)]
        out: PathBuf,
    },

    /// Verify firmware checksums
    Verify {
        /// Firmware image
        file: PathBuf,

        /// Rewrite mismatching checksums
        #[arg(long)]
        fix: bool,

        /// Correct without asking
        #[arg(long, requires = "fix")]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("gmlan_cli=debug,gmlan=debug,example_ecu=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "gmlan_cli=info,gmlan=warn".into())
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

    // Merge CLI args with config
    let merged = config.merge_with_args(cli.ecu, cli.transport, cli.interface.as_deref());

    let sim = cli
        .sim_config
        .as_ref()
        .map(|path| {
            SimConfig::load(path)
                .with_context(|| format!("Failed to load simulator config {}", path.display()))
        })
        .transpose()?;

    let ctx = OutputContext::new(cli.output, cli.no_color, cli.quiet);

    let result = match &cli.command {
        Commands::Verify { file, fix, yes } => {
            commands::verify(file, *fix, *yes, default_sink(), &ctx)
        }

        Commands::Dump {
            address,
            length,
            block_size,
            out,
        } => {
            commands::dump(&merged, sim.as_ref(), *address, *length, *block_size, out, &ctx).await
        }

        Commands::Info { ids, all } => connect(&merged, sim.as_ref())
            .and_then(|mut conn| commands::info(&mut conn, ids, *all, &ctx)),
        Commands::ReadId { id, raw } => connect(&merged, sim.as_ref())
            .and_then(|mut conn| commands::read_id(&mut conn, *id, *raw, &ctx)),
        Commands::Dtc { clear } => connect(&merged, sim.as_ref())
            .and_then(|mut conn| commands::dtc(&mut conn, *clear, &ctx)),
        Commands::State => connect(&merged, sim.as_ref())
            .and_then(|mut conn| commands::state(&mut conn, &ctx)),
        Commands::Unlock { level, mode, key } => connect(&merged, sim.as_ref())
            .and_then(|mut conn| commands::unlock(&mut conn, *level, *mode, key, &ctx)),
    };

    if let Err(e) = &result {
        ctx.error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

/// Open a session with events forwarded to tracing
fn connect(config: &GmlanConfig, sim: Option<&SimConfig>) -> Result<Connection> {
    Connection::open(config, sim, default_sink())
}

fn parse_level(s: &str) -> Result<u8, String> {
    let value = parse_number(s)?;
    u8::try_from(value).map_err(|_| format!("{} does not fit one byte", s))
}

fn parse_block_size(s: &str) -> Result<u16, String> {
    match parse_number(s)? {
        0 => Err("block size must be at least 1".to_string()),
        n => u16::try_from(n).map_err(|_| format!("{} does not fit 16 bits", s)),
    }
}
