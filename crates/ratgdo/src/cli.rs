//! Clap derive structures for the `ratgdo` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// ratgdo -- talk to ratgdo garage door controllers on the local network
#[derive(Debug, Parser)]
#[command(
    name = "ratgdo",
    version,
    about = "Discover, watch and operate ratgdo garage door controllers",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configured device to use
    #[arg(long, short = 'd', env = "RATGDO_DEVICE", global = true)]
    pub device: Option<String>,

    /// Device host[:port] (bypasses the config file)
    #[arg(long, env = "RATGDO_HOST", global = true, conflicts_with = "device")]
    pub host: Option<String>,

    /// Config file path (defaults to the platform config directory)
    #[arg(long, env = "RATGDO_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress normal output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Read model and serial from the device heartbeat
    Discover(DiscoverArgs),

    /// Print the current door, lock and sensor state
    Status(StatusArgs),

    /// Stream state changes until interrupted
    Watch,

    /// Open the door
    Open(DoorArgs),

    /// Close the door
    Close(DoorArgs),

    /// List configured devices
    Devices,
}

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Give up after this many seconds
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Give up waiting for the first door report after this many seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
}

#[derive(Debug, Args)]
pub struct DoorArgs {
    /// Wait up to this many seconds for the door to finish moving
    #[arg(long, value_name = "SECS")]
    pub wait: Option<u64>,
}
