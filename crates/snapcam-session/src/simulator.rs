use std::collections::{HashMap, VecDeque};

use bytes::{Bytes, BytesMut};
use serde_json::{json, Value};
use snapcam_frame::{encode_message, opcode, split_frames, ACK_FRAME, CRC_TRAILER_LEN, START_BYTE};
use snapcam_transport::{ascii_preview, CommandWriter, NotificationSender, Result};
use tracing::{debug, trace, warn};

/// Behaviour knobs for [`SimulatedCamera`].
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Size of the notification chunks a response is cut into.
    pub chunk_size: usize,
    /// Number of command frames to swallow without acknowledging.
    pub drop_acks: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            chunk_size: snapcam_frame::DEFAULT_MAX_FRAME_SIZE,
            drop_acks: 0,
        }
    }
}

/// In-process stand-in for the camera's GATT command characteristic.
///
/// Every write is answered synchronously through the notification sender:
/// command frames are acknowledged, complete commands are decoded and, for
/// queries, the first chunk of the reply is pushed. Each `{"ret":1}` written
/// afterwards releases the next chunk.
pub struct SimulatedCamera {
    notifier: NotificationSender,
    config: SimulatorConfig,
    inbound: BytesMut,
    pending: VecDeque<Bytes>,
    responses: HashMap<u8, Value>,
    writes: Vec<Bytes>,
    received: Vec<Value>,
}

impl SimulatedCamera {
    /// A camera with stock replies for every query opcode.
    pub fn new(notifier: NotificationSender) -> Self {
        Self::with_config(notifier, SimulatorConfig::default())
    }

    pub fn with_config(notifier: NotificationSender, config: SimulatorConfig) -> Self {
        Self {
            notifier,
            config,
            inbound: BytesMut::new(),
            pending: VecDeque::new(),
            responses: default_responses(),
            writes: Vec::new(),
            received: Vec::new(),
        }
    }

    /// Reply to `opcode` with `response` instead of the stock reply.
    pub fn with_response(mut self, opcode: u8, response: Value) -> Self {
        self.responses.insert(opcode, response);
        self
    }

    /// Swallow the next `count` command frames.
    pub fn drop_acks(mut self, count: usize) -> Self {
        self.config.drop_acks = count;
        self
    }

    /// Cut replies into chunks of `size` bytes.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Never acknowledge anything.
    pub fn silent(self) -> Self {
        self.drop_acks(usize::MAX)
    }

    /// Every frame written so far, acknowledgments included.
    pub fn writes(&self) -> &[Bytes] {
        &self.writes
    }

    /// Decoded command objects, in arrival order.
    pub fn received(&self) -> &[Value] {
        &self.received
    }

    pub fn last_command(&self) -> Option<&Value> {
        self.received.last()
    }

    fn on_command_frame(&mut self, frame: &[u8]) {
        if frame.first() == Some(&START_BYTE) {
            if !self.inbound.is_empty() {
                warn!(
                    discarded = self.inbound.len(),
                    "new command before previous completed"
                );
            }
            self.inbound.clear();
            self.pending.clear();
        } else if self.inbound.is_empty() {
            warn!(frame = %ascii_preview(frame), "continuation frame without a command");
            return;
        }

        self.inbound.extend_from_slice(frame);
        self.notifier.push(Bytes::from_static(ACK_FRAME));

        match command_len(&self.inbound) {
            Some(Ok(total)) if self.inbound.len() >= total => {
                let message = self.inbound.split().freeze();
                self.on_command(&message, total);
            }
            Some(Err(())) => {
                warn!(inbound = %ascii_preview(&self.inbound), "unparseable command header");
                self.inbound.clear();
            }
            _ => {}
        }
    }

    fn on_command(&mut self, message: &[u8], total: usize) {
        let payload_end = total - CRC_TRAILER_LEN;
        let Some(payload_start) = message.iter().position(|&b| b == b'{') else {
            return;
        };
        let command: Value = match serde_json::from_slice(&message[payload_start..payload_end]) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "command payload is not JSON");
                return;
            }
        };

        let opcode = command
            .get("Type")
            .and_then(Value::as_u64)
            .and_then(|t| u8::try_from(t).ok());
        debug!(?opcode, %command, "simulated camera received command");
        self.received.push(command);

        let Some(response) = opcode.and_then(|op| self.responses.get(&op)) else {
            return;
        };
        let payload = response.to_string();
        let mut reply = BytesMut::new();
        encode_message(payload.as_bytes(), &mut reply);
        match split_frames(reply.freeze(), self.config.chunk_size) {
            Ok(chunks) => {
                self.pending = chunks.into();
                self.release_chunk();
            }
            Err(err) => warn!(error = %err, "cannot chunk reply"),
        }
    }

    fn release_chunk(&mut self) {
        if let Some(chunk) = self.pending.pop_front() {
            trace!(
                chunk = %ascii_preview(&chunk),
                remaining = self.pending.len(),
                "simulated camera notify"
            );
            self.notifier.push(chunk);
        }
    }
}

impl CommandWriter for SimulatedCamera {
    fn write_command(&mut self, frame: &[u8]) -> Result<()> {
        self.writes.push(Bytes::copy_from_slice(frame));

        if frame == ACK_FRAME && self.inbound.is_empty() {
            if self.pending.is_empty() {
                trace!("ack with no reply pending");
            }
            self.release_chunk();
            return Ok(());
        }

        if self.config.drop_acks > 0 {
            self.config.drop_acks -= 1;
            debug!(
                remaining = self.config.drop_acks,
                "simulated camera dropping frame"
            );
            self.inbound.clear();
            return Ok(());
        }

        self.on_command_frame(frame);
        Ok(())
    }
}

impl std::fmt::Debug for SimulatedCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedCamera")
            .field("config", &self.config)
            .field("pending", &self.pending.len())
            .field("received", &self.received.len())
            .finish_non_exhaustive()
    }
}

/// Full message length once the header is readable; `Err` for a bad header.
fn command_len(inbound: &[u8]) -> Option<std::result::Result<usize, ()>> {
    let brace = inbound.iter().position(|&b| b == b'{')?;
    let digits = &inbound[1..brace];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_hexdigit) {
        return Some(Err(()));
    }
    let declared = std::str::from_utf8(digits)
        .ok()
        .and_then(|d| usize::from_str_radix(d, 16).ok())
        .ok_or(());
    Some(declared.map(|len| brace + len + CRC_TRAILER_LEN))
}

fn default_responses() -> HashMap<u8, Value> {
    HashMap::from([
        (
            opcode::GET_FIRMWARE_VERSION,
            json!({"ret": 1, "ver": "SNAPCAM_V1.0.8"}),
        ),
        (
            opcode::GET_STORAGE_INFO,
            json!({"ret": 1, "total": "3b9aca00", "free": "1dcd6500"}),
        ),
        (opcode::GET_BATTERY_LEVEL, json!({"ret": 1, "battery": "4"})),
        (
            opcode::GET_WIFI_AP_INFO,
            json!({"ret": 1, "ssid": "SnapCam_5A3C", "pwd": "12345678"}),
        ),
        (opcode::GET_IP_ADDRESS, json!({"ret": 1, "ip": "192.168.1.1"})),
    ])
}
