use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgGroup, Args, Subcommand};
use xbeelink_dispatch::{Address16, Address64, AtCommand, Radio, RadioConfig};

use crate::exit::{radio_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod at;
pub mod discover;
pub mod monitor;
pub mod remote;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a local AT command and print the response.
    At(AtArgs),
    /// Run an AT command on a remote node and print the response.
    Remote(RemoteArgs),
    /// Transmit application data to a node.
    Send(SendArgs),
    /// Discover nodes on the network.
    Discover(DiscoverArgs),
    /// Print I/O samples, received data and status events.
    Monitor(MonitorArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Settings shared by every subcommand.
#[derive(Debug, Clone, Copy)]
pub struct Context {
    pub format: OutputFormat,
    pub baud: u32,
}

impl Context {
    /// Open the radio on `port` with the global line settings.
    pub fn open_radio(&self, port: &PortArgs) -> CliResult<Radio> {
        let mut config = RadioConfig::new(&port.port);
        config.serial.baud_rate = self.baud;
        Radio::open(&config)
            .map_err(|err| radio_error(&format!("failed to open {}", port.port.display()), err))
    }
}

pub fn run(command: Command, ctx: Context) -> CliResult<i32> {
    match command {
        Command::At(args) => at::run(args, ctx),
        Command::Remote(args) => remote::run(args, ctx),
        Command::Send(args) => send::run(args, ctx),
        Command::Discover(args) => discover::run(args, ctx),
        Command::Monitor(args) => monitor::run(args, ctx),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct PortArgs {
    /// Serial device the radio is attached to.
    #[arg(long, short = 'p', env = "XBEELINK_PORT", value_name = "DEVICE")]
    pub port: PathBuf,
}

#[derive(Args, Debug)]
pub struct AtArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Two-letter AT command, e.g. MY or NI.
    pub command: AtCommand,
    /// Parameter bytes as hex (e.g. 0A or 0x1F2E). Omit to query.
    #[arg(long, value_name = "HEX")]
    pub param: Option<String>,
    /// How long to wait for the response (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct RemoteArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// 64-bit serial number of the target node, in hex.
    pub dest: Address64,
    /// Two-letter AT command, e.g. IS or D1.
    pub command: AtCommand,
    /// 16-bit network address of the target, in hex. Default: FFFE (unknown).
    #[arg(long, value_name = "HEX")]
    pub dest16: Option<Address16>,
    /// Parameter bytes as hex. Omit to query.
    #[arg(long, value_name = "HEX")]
    pub param: Option<String>,
    /// How long to wait for the response (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("payload").required(true).args(["data", "hex"])))]
pub struct SendArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// 64-bit serial number of the target node, in hex. FFFF broadcasts.
    pub dest: Address64,
    /// 16-bit network address of the target, in hex.
    #[arg(long, value_name = "HEX")]
    pub dest16: Option<Address16>,
    /// String payload.
    #[arg(long)]
    pub data: Option<String>,
    /// Payload as hex bytes.
    #[arg(long, value_name = "HEX")]
    pub hex: Option<String>,
    /// Wait for the transmit status and report delivery.
    #[arg(long)]
    pub wait: bool,
    /// How long to wait for the transmit status when --wait is set.
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// How long to collect responses (e.g. 6s).
    #[arg(long, default_value = "6s")]
    pub duration: String,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Exit after printing N events.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Parse hex bytes, allowing an optional `0x` prefix and whitespace.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let trimmed = input.trim();
    let digits: String = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CliError::new(USAGE, format!("invalid hex input: {input:?}")));
    }
    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("hex input {input:?} has an odd number of digits"),
        ));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| CliError::new(USAGE, format!("invalid hex input: {input:?}")))
        })
        .collect()
}

fn optional_hex(input: Option<&str>) -> CliResult<Vec<u8>> {
    input.map_or_else(|| Ok(Vec::new()), parse_hex)
}
