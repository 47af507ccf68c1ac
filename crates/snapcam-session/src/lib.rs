//! Command session management for the snapcam BLE protocol.
//!
//! This is the "just works" layer. Hand it a command writer, feed BLE
//! notifications into its queue, and send commands; per-frame acknowledgments,
//! timeouts, whole-command retries and response reassembly are handled here.

pub mod camera;
pub mod config;
pub mod error;
pub mod session;
pub mod simulator;

pub use camera::{
    Camera, CaptureState, ClockTime, DeviceInfo, InvalidClockTime, StorageInfo, WifiApInfo,
};
pub use config::{SessionConfig, DEFAULT_RESPONSE_TIMEOUT, MAX_SEND_RETRY};
pub use error::{Result, SessionError};
pub use session::Session;
pub use simulator::{SimulatedCamera, SimulatorConfig};
