use std::io::{IsTerminal, Write};

use bytes::Bytes;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;
use snapcam_frame::{expects_response, opcode_name, CATALOG};
use snapcam_session::{CaptureState, DeviceInfo, WifiApInfo};
use snapcam_transport::ascii_preview;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput {
    index: usize,
    size: usize,
    hex: String,
    ascii: String,
}

#[derive(Serialize)]
struct EncodeOutput<'a> {
    opcode: u8,
    command: &'a str,
    payload: &'a Value,
    frames: Vec<FrameOutput>,
}

/// Outcome of a command run against the simulated camera.
#[derive(Serialize)]
pub struct SimulationOutput<'a> {
    pub opcode: u8,
    pub command: &'a str,
    pub expect_response: bool,
    pub result: &'a Value,
    pub frames_written: usize,
    pub acks_written: usize,
}

/// What the typed camera API reports after connecting.
#[derive(Serialize)]
pub struct CameraReport {
    pub device: DeviceInfo,
    pub wifi: WifiApInfo,
    pub ip_address: String,
    pub capture_state: CaptureState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clock: Option<String>,
}

#[derive(Serialize)]
struct CatalogEntry {
    opcode: u8,
    name: &'static str,
    expects_response: bool,
}

pub fn print_frames(opcode: u8, payload: &Value, frames: &[Bytes], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = EncodeOutput {
                opcode,
                command: opcode_name(opcode),
                payload,
                frames: frames
                    .iter()
                    .enumerate()
                    .map(|(index, frame)| FrameOutput {
                        index,
                        size: frame.len(),
                        hex: to_hex(frame),
                        ascii: ascii_preview(frame),
                    })
                    .collect(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "SIZE", "HEX", "ASCII"]);
            for (index, frame) in frames.iter().enumerate() {
                table.add_row(vec![
                    index.to_string(),
                    frame.len().to_string(),
                    to_hex(frame),
                    ascii_preview(frame),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "opcode={} ({}) frames={} payload={}",
                opcode,
                opcode_name(opcode),
                frames.len(),
                payload
            );
            for (index, frame) in frames.iter().enumerate() {
                println!("  [{index}] {}", ascii_preview(frame));
            }
        }
        OutputFormat::Raw => {
            for frame in frames {
                print_raw(frame);
            }
        }
    }
}

pub fn print_value(value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{value}"),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            match value {
                Value::Object(fields) => {
                    for (key, field) in fields {
                        table.add_row(vec![key.clone(), scalar(field)]);
                    }
                }
                other => {
                    table.add_row(vec![String::new(), scalar(other)]);
                }
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{}",
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            );
        }
        OutputFormat::Raw => print_raw(value.to_string().as_bytes()),
    }
}

pub fn print_simulation(out: &SimulationOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["OPCODE", "COMMAND", "FRAMES", "ACKS", "RESULT"])
                .add_row(vec![
                    out.opcode.to_string(),
                    out.command.to_string(),
                    out.frames_written.to_string(),
                    out.acks_written.to_string(),
                    out.result.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "opcode={} ({}) frames={} acks={} result={}",
                out.opcode, out.command, out.frames_written, out.acks_written, out.result
            );
        }
        OutputFormat::Raw => print_raw(out.result.to_string().as_bytes()),
    }
}

pub fn print_report(report: &CameraReport, format: OutputFormat) {
    let mut rows = vec![
        ("firmware", report.device.firmware_version.clone()),
        ("storage_total", report.device.storage.total.to_string()),
        ("storage_free", report.device.storage.free.to_string()),
        ("battery", report.device.battery_level.to_string()),
        ("ssid", report.wifi.ssid.clone()),
        ("password", report.wifi.password.clone()),
        ("ip", report.ip_address.clone()),
        ("capture", report.capture_state.to_string()),
    ];
    if let Some(clock) = &report.clock {
        rows.push(("clock", clock.clone()));
    }

    match format {
        OutputFormat::Json | OutputFormat::Raw => print_json(report),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (field, value) in rows {
                table.add_row(vec![field.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (field, value) in rows {
                println!("{field:>14}: {value}");
            }
        }
    }
}

pub fn print_catalog(format: OutputFormat) {
    let entries: Vec<CatalogEntry> = CATALOG
        .iter()
        .map(|&opcode| CatalogEntry {
            opcode,
            name: opcode_name(opcode),
            expects_response: expects_response(opcode),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&entries),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["OPCODE", "NAME", "RESPONSE"]);
            for entry in &entries {
                table.add_row(vec![
                    entry.opcode.to_string(),
                    entry.name.to_string(),
                    if entry.expects_response { "yes" } else { "ack" }.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for entry in &entries {
                let marker = if entry.expects_response { " *" } else { "" };
                println!("{:>3}  {}{marker}", entry.opcode, entry.name);
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Parse a hex string, tolerating `0x`, spaces and `:` separators.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, String> {
    let trimmed = input.trim();
    let digits: Vec<u8> = trimmed
        .strip_prefix("0x")
        .unwrap_or(trimmed)
        .bytes()
        .filter(|b| !matches!(b, b' ' | b':'))
        .collect();
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in {input:?}"));
    }
    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| format!("invalid hex in {input:?}"))
        })
        .collect()
}
