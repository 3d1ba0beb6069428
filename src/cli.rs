//! Command line interface.

use std::{num::ParseIntError, path::PathBuf, str::FromStr};

use anyhow::Result;
use structopt::StructOpt;

use crate::{cmd, color::Color, probe::plan::SessionIntent};

/// Debug STM32 targets through the ST-LINK GDB server.
#[derive(Debug, StructOpt)]
#[structopt(name = "stlink-runner")]
pub struct Cli {
    /// Pass many times for more log output
    #[structopt(long, short, parse(from_occurrences))]
    pub verbosity: u64,
    /// Coloring: auto, always, never
    #[structopt(long, name = "when", default_value = "auto")]
    pub color: Color,
    #[structopt(subcommand)]
    pub cmd: Cmd,
}

/// Subcommands.
#[derive(Debug, StructOpt)]
pub enum Cmd {
    /// Attach GDB to the running target without resetting it
    Attach(RunnerCmd),
    /// Start the GDB server and a new GDB session
    Debug(RunnerCmd),
    /// Run the GDB server only
    Debugserver(RunnerCmd),
    /// Show the toolchain, boot mode and command lines without running them
    Inspect(InspectCmd),
}

/// Options shared by all session commands.
#[derive(Debug, StructOpt)]
pub struct RunnerCmd {
    /// Firmware ELF file
    #[structopt(long, parse(from_os_str))]
    pub elf_file: PathBuf,
    /// Build directory
    #[structopt(long, parse(from_os_str), default_value = "build")]
    pub build_dir: PathBuf,
    /// GDB executable
    #[structopt(long, parse(from_os_str), env = "STLINK_RUNNER_GDB")]
    pub gdb: Option<PathBuf>,
    /// Use JTAG instead of SWD
    #[structopt(long)]
    pub no_swd: bool,
    /// Target debug access port
    #[structopt(long)]
    pub apid: Option<u32>,
    /// GDB server port [default: 61234]
    #[structopt(long)]
    pub port_number: Option<u16>,
    /// ST-LINK serial number
    #[structopt(long)]
    pub dev_id: Option<String>,
    /// External loader file name (from STM32CubeProgrammer's ExternalLoader directory)
    #[structopt(long)]
    pub extload: Option<String>,
    /// Run Init() from the external loader after reset
    #[structopt(long)]
    pub external_init: bool,
    /// Address to attach application symbols at when debugging through MCUboot
    #[structopt(long, parse(try_from_str = parse_address))]
    pub app_offset: Option<u32>,
    /// Seconds GDB retries connecting to the server [default: 15]
    #[structopt(long)]
    pub connect_timeout: Option<u32>,
    /// Configuration file [default: ./stlink-runner.toml if present]
    #[structopt(long, parse(from_os_str))]
    pub config: Option<PathBuf>,
}

/// `inspect` options.
#[derive(Debug, StructOpt)]
pub struct InspectCmd {
    /// Command to plan: attach, debug, debugserver
    #[structopt(long, default_value = "debug", parse(try_from_str = parse_intent))]
    pub intent: SessionIntent,
    /// Report a missing toolchain instead of failing
    #[structopt(long)]
    pub allow_missing_tools: bool,
    #[structopt(flatten)]
    pub runner: RunnerCmd,
}

impl Cli {
    /// Runs the program.
    pub async fn run(self) -> Result<()> {
        init_logger(self.verbosity);
        match self.cmd {
            Cmd::Attach(cmd) => cmd::session::run(cmd, SessionIntent::Attach).await,
            Cmd::Debug(cmd) => cmd::session::run(cmd, SessionIntent::DebugNew).await,
            Cmd::Debugserver(cmd) => cmd::session::run(cmd, SessionIntent::ServerOnly).await,
            Cmd::Inspect(cmd) => cmd::inspect::run(cmd, self.color),
        }
    }
}

fn init_logger(verbosity: u64) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// Parses a decimal or `0x`-prefixed hexadecimal address.
pub fn parse_address(s: &str) -> Result<u32, ParseIntError> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => u32::from_str(s),
    }
}

fn parse_intent(s: &str) -> Result<SessionIntent, String> {
    SessionIntent::ALL
        .iter()
        .copied()
        .find(|intent| intent.name() == s)
        .ok_or_else(|| format!("unknown command `{}` (attach, debug, debugserver)", s))
}
