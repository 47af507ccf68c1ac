use std::time::Duration;

use clap::{Args, Subcommand};
use serde_json::{Map, Value};
use snapcam_frame::{opcode_name, Command as CameraCommand, CATALOG};

use crate::exit::{frame_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod commands;
pub mod decode;
pub mod encode;
pub mod info;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a command into the frames written to the camera.
    Encode(EncodeArgs),
    /// Reassemble and parse response sub-frames given as hex.
    Decode(DecodeArgs),
    /// List the known command opcodes.
    Commands,
    /// Run a command through a full session against a simulated camera.
    Simulate(SimulateArgs),
    /// Query a simulated camera through the typed camera API.
    Info(InfoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Commands => commands::run(format),
        Command::Simulate(args) => simulate::run(args, format),
        Command::Info(args) => info::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Opcode number or catalog name (e.g. 25, get-firmware-version).
    #[arg(value_parser = parse_opcode)]
    pub opcode: u8,
    /// Command arguments as a JSON object.
    #[arg(long, value_name = "JSON")]
    pub args: Option<String>,
    /// Largest frame to emit, in bytes.
    #[arg(long, default_value_t = snapcam_frame::DEFAULT_MAX_FRAME_SIZE)]
    pub frame_size: usize,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Response sub-frames in arrival order, hex encoded.
    #[arg(required = true, num_args = 1..)]
    pub subframes: Vec<String>,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Opcode number or catalog name.
    #[arg(value_parser = parse_opcode)]
    pub opcode: u8,
    /// Command arguments as a JSON object.
    #[arg(long, value_name = "JSON")]
    pub args: Option<String>,
    /// Wait for a JSON response even if the opcode is not a known query.
    #[arg(long)]
    pub response: bool,
    /// Reply the simulated camera sends for this opcode.
    #[arg(long, value_name = "JSON")]
    pub reply: Option<String>,
    /// Command frames the simulated camera swallows before answering.
    #[arg(long, default_value_t = 0)]
    pub drop_acks: usize,
    /// Notification size used by the simulated camera.
    #[arg(long, default_value_t = snapcam_frame::DEFAULT_MAX_FRAME_SIZE)]
    pub chunk_size: usize,
    /// Per-notification wait (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Whole-command attempts before giving up.
    #[arg(long, default_value_t = snapcam_session::MAX_SEND_RETRY)]
    pub attempts: u32,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Command frames the simulated camera swallows before answering.
    #[arg(long, default_value_t = 0)]
    pub drop_acks: usize,
    /// Per-notification wait (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Also set the camera clock to the host's local time.
    #[arg(long)]
    pub sync_clock: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Accept a decimal opcode or a catalog name.
pub fn parse_opcode(input: &str) -> Result<u8, String> {
    if let Ok(opcode) = input.parse::<u8>() {
        return Ok(opcode);
    }
    CATALOG
        .iter()
        .copied()
        .find(|&op| opcode_name(op) == input)
        .ok_or_else(|| format!("unknown command {input:?} (see `snapcam commands`)"))
}

/// Build a command from an opcode and optional JSON argument text.
pub fn build_command(opcode: u8, args: Option<&str>) -> CliResult<CameraCommand> {
    let value = match args {
        Some(text) => serde_json::from_str::<Value>(text)
            .map_err(|err| CliError::usage(format!("--args is not valid JSON: {err}")))?,
        None => Value::Object(Map::new()),
    };
    CameraCommand::from_value(opcode, value).map_err(|err| frame_error("--args", err))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
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
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
