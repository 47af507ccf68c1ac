use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Local, Timelike};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use snapcam_frame::{opcode, opcode_name, Command};
use snapcam_transport::CommandWriter;
use tracing::{debug, info};

use crate::error::{Result, SessionError};
use crate::session::Session;

/// Capture mode the host believes the camera is in.
///
/// The camera never reports this; it is tracked from the commands this client
/// sent successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureState {
    #[default]
    Idle,
    RecordingVideo,
    Timelapse,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::RecordingVideo => "recording video",
            Self::Timelapse => "timelapse",
        })
    }
}

/// Storage totals in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StorageInfo {
    pub total: u64,
    pub free: u64,
}

/// Credentials of the camera's WiFi access point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WifiApInfo {
    pub ssid: String,
    pub password: String,
}

/// Summary gathered right after connecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub firmware_version: String,
    pub storage: StorageInfo,
    pub battery_level: u8,
}

/// Error for an out-of-range or badly formatted [`ClockTime`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid clock time: {0}")]
pub struct InvalidClockTime(String);

/// Wall-clock time in the camera's `YYYYMMDDHHMMSS` format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTime {
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
}

impl ClockTime {
    pub fn new(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> std::result::Result<Self, InvalidClockTime> {
        let checks = [
            (year <= 9999, "year"),
            ((1..=12).contains(&month), "month"),
            ((1..=31).contains(&day), "day"),
            (hour < 24, "hour"),
            (minute < 60, "minute"),
            (second < 60, "second"),
        ];
        if let Some((_, field)) = checks.iter().find(|(ok, _)| !ok) {
            return Err(InvalidClockTime(format!("{field} out of range")));
        }
        Ok(Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        })
    }

    /// Host local time, as the camera expects it.
    pub fn now() -> std::result::Result<Self, InvalidClockTime> {
        Self::from_datetime(&Local::now())
    }

    /// Take the calendar fields of any chrono date-time.
    pub fn from_datetime<T: Datelike + Timelike>(
        datetime: &T,
    ) -> std::result::Result<Self, InvalidClockTime> {
        let year = u16::try_from(datetime.year())
            .map_err(|_| InvalidClockTime(format!("year {} out of range", datetime.year())))?;
        let narrow = |v: u32| u8::try_from(v).unwrap_or(u8::MAX);
        Self::new(
            year,
            narrow(datetime.month()),
            narrow(datetime.day()),
            narrow(datetime.hour()),
            narrow(datetime.minute()),
            // Leap seconds surface as 60.
            narrow(datetime.second().min(59)),
        )
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}{:02}{:02}{:02}{:02}{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

impl FromStr for ClockTime {
    type Err = InvalidClockTime;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.len() != 14 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidClockTime(format!(
                "expected 14 digits (YYYYMMDDHHMMSS), got {s:?}"
            )));
        }
        // All ASCII digits, so slicing and parsing cannot fail.
        let num = |range: std::ops::Range<usize>| s[range].parse::<u16>().unwrap_or_default();
        let narrow = |v: u16| u8::try_from(v).unwrap_or(u8::MAX);
        Self::new(
            num(0..4),
            narrow(num(4..6)),
            narrow(num(6..8)),
            narrow(num(8..10)),
            narrow(num(10..12)),
            narrow(num(12..14)),
        )
    }
}

/// Typed camera operations on top of a [`Session`].
pub struct Camera<W> {
    session: Session<W>,
    state: CaptureState,
}

impl<W: CommandWriter> Camera<W> {
    pub fn new(session: Session<W>) -> Self {
        Self {
            session,
            state: CaptureState::Idle,
        }
    }

    pub fn session(&self) -> &Session<W> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<W> {
        &mut self.session
    }

    pub fn into_session(self) -> Session<W> {
        self.session
    }

    /// Capture mode as tracked by this client.
    pub fn capture_state(&self) -> CaptureState {
        self.state
    }

    /// Forget the tracked capture mode, e.g. after a reconnect.
    pub fn reset_capture_state(&mut self) {
        self.state = CaptureState::Idle;
    }

    /// Send an arbitrary opcode, bypassing the typed API.
    pub fn send_raw(
        &mut self,
        opcode: u8,
        args: Map<String, Value>,
        expect_response: bool,
    ) -> Result<Value> {
        self.session.send(opcode, args, expect_response)
    }

    pub fn firmware_version(&mut self) -> Result<String> {
        let reply: FirmwareReply = self.query(opcode::GET_FIRMWARE_VERSION)?;
        Ok(reply.ver)
    }

    /// Storage totals; the camera reports them as hex strings.
    pub fn storage_info(&mut self) -> Result<StorageInfo> {
        let reply: StorageReply = self.query(opcode::GET_STORAGE_INFO)?;
        Ok(StorageInfo {
            total: reply.total,
            free: reply.free,
        })
    }

    /// Battery level in bars.
    pub fn battery_level(&mut self) -> Result<u8> {
        let reply: BatteryReply = self.query(opcode::GET_BATTERY_LEVEL)?;
        match reply.battery {
            BatteryLevel::Number(level) => Ok(level),
            BatteryLevel::Text(text) => text.trim().parse().map_err(|_| {
                SessionError::UnexpectedResponse(format!(
                    "{}: battery level {text:?} is not a number",
                    opcode_name(opcode::GET_BATTERY_LEVEL)
                ))
            }),
        }
    }

    pub fn wifi_ap_info(&mut self) -> Result<WifiApInfo> {
        let reply: WifiReply = self.query(opcode::GET_WIFI_AP_INFO)?;
        Ok(WifiApInfo {
            ssid: reply.ssid,
            password: reply.password,
        })
    }

    /// Address of the camera on its own access point.
    pub fn ip_address(&mut self) -> Result<String> {
        let reply: IpReply = self.query(opcode::GET_IP_ADDRESS)?;
        Ok(reply.ip)
    }

    /// Switch on the camera's WiFi access point.
    ///
    /// The camera is known to ignore the request when another command follows
    /// immediately; give it a moment before sending more.
    pub fn enable_wifi(&mut self) -> Result<()> {
        self.execute(Command::new(opcode::ENABLE_WIFI))
    }

    pub fn set_device_name(&mut self, name: &str) -> Result<()> {
        self.execute(Command::new(opcode::SET_DEVICE_NAME).arg("Name", name))
    }

    pub fn set_auto_rotation(&mut self, enabled: bool) -> Result<()> {
        let value = if enabled { "On" } else { "Off" };
        self.execute(Command::new(opcode::AUTO_ROTATION).arg("AutoRotation", value))
    }

    pub fn set_video_mode(&mut self, mode: &str) -> Result<()> {
        self.execute(Command::new(opcode::SET_VIDEO_MODE).arg("VideoMode", mode))
    }

    pub fn set_photo_mode(&mut self, mode: &str) -> Result<()> {
        self.execute(Command::new(opcode::SET_PHOTO_MODE).arg("PhotoMode", mode))
    }

    /// Seconds between timelapse shots.
    pub fn set_timelapse_interval(&mut self, seconds: u32) -> Result<()> {
        self.execute(
            Command::new(opcode::SET_TIMELAPSE_INTERVAL).arg("second", seconds.to_string()),
        )
    }

    pub fn set_clock(&mut self, time: ClockTime) -> Result<()> {
        info!(%time, "setting camera clock");
        self.execute(Command::new(opcode::SET_CLOCK).arg("time", time.to_string()))
    }

    /// Set the camera clock to the host's local time.
    pub fn sync_clock(&mut self) -> Result<ClockTime> {
        let now = ClockTime::now()?;
        self.set_clock(now)?;
        Ok(now)
    }

    pub fn take_picture(&mut self) -> Result<()> {
        self.require_idle("take a picture")?;
        self.execute(Command::new(opcode::TAKE_PICTURE))
    }

    pub fn start_video(&mut self) -> Result<()> {
        self.require_idle("start video")?;
        self.execute(Command::new(opcode::START_VIDEO))?;
        self.transition(CaptureState::RecordingVideo);
        Ok(())
    }

    pub fn stop_video(&mut self) -> Result<()> {
        self.execute(Command::new(opcode::STOP_VIDEO))?;
        self.transition(CaptureState::Idle);
        Ok(())
    }

    pub fn start_timelapse(&mut self) -> Result<()> {
        self.require_idle("start timelapse")?;
        self.execute(Command::new(opcode::START_TIMELAPSE))?;
        self.transition(CaptureState::Timelapse);
        Ok(())
    }

    pub fn stop_timelapse(&mut self) -> Result<()> {
        self.execute(Command::new(opcode::STOP_TIMELAPSE))?;
        self.transition(CaptureState::Idle);
        Ok(())
    }

    /// Start recording when idle, stop when recording.
    pub fn toggle_video(&mut self) -> Result<CaptureState> {
        match self.state {
            CaptureState::RecordingVideo => self.stop_video()?,
            _ => self.start_video()?,
        }
        Ok(self.state)
    }

    /// Start a timelapse when idle, stop a running one.
    pub fn toggle_timelapse(&mut self) -> Result<CaptureState> {
        match self.state {
            CaptureState::Timelapse => self.stop_timelapse()?,
            _ => self.start_timelapse()?,
        }
        Ok(self.state)
    }

    /// Firmware, storage and battery, queried in that order.
    pub fn device_info(&mut self) -> Result<DeviceInfo> {
        Ok(DeviceInfo {
            firmware_version: self.firmware_version()?,
            storage: self.storage_info()?,
            battery_level: self.battery_level()?,
        })
    }

    fn query<T: DeserializeOwned>(&mut self, opcode: u8) -> Result<T> {
        let reply = self.session.request(&Command::new(opcode))?;
        T::deserialize(&reply).map_err(|err| {
            SessionError::UnexpectedResponse(format!("{}: {err} in {reply}", opcode_name(opcode)))
        })
    }

    fn execute(&mut self, command: Command) -> Result<()> {
        self.session.execute(&command)
    }

    fn require_idle(&self, action: &str) -> Result<()> {
        if self.state == CaptureState::Idle {
            Ok(())
        } else {
            Err(SessionError::Busy(format!(
                "cannot {action} while {}",
                self.state
            )))
        }
    }

    fn transition(&mut self, next: CaptureState) {
        debug!(from = %self.state, to = %next, "capture state");
        self.state = next;
    }
}

impl<W> fmt::Debug for Camera<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Camera")
            .field("session", &self.session)
            .field("state", &self.state)
            .finish()
    }
}

#[derive(Deserialize)]
struct FirmwareReply {
    ver: String,
}

#[derive(Deserialize)]
struct StorageReply {
    #[serde(deserialize_with = "hex_u64")]
    total: u64,
    #[serde(deserialize_with = "hex_u64")]
    free: u64,
}

#[derive(Deserialize)]
struct BatteryReply {
    battery: BatteryLevel,
}

/// Firmware revisions disagree on whether the level is a number or a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum BatteryLevel {
    Number(u8),
    Text(String),
}

#[derive(Deserialize)]
struct WifiReply {
    ssid: String,
    #[serde(rename = "pwd")]
    password: String,
}

#[derive(Deserialize)]
struct IpReply {
    ip: String,
}

fn hex_u64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    let text = String::deserialize(deserializer)?;
    let digits = text.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(D::Error::custom(format!("{text:?} is not a hex number")));
    }
    u64::from_str_radix(digits, 16).map_err(D::Error::custom)
}
