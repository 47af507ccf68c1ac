//! BLE transport seam for snapcam.
//!
//! The BLE stack itself (discovery, GATT resolution, connection lifecycle) lives
//! outside this workspace. What it hands us is reduced to two things:
//! - a way to write bytes to the command characteristic ([`CommandWriter`])
//! - a callback fired for every notification, which feeds a
//!   [`NotificationQueue`] through its [`NotificationSender`]
//!
//! This is the lowest layer of snapcam. Everything else builds on top of it.

pub mod error;
pub mod queue;
pub mod traits;

pub use error::{Result, TransportError};
pub use queue::{NotificationQueue, NotificationSender};
pub use traits::{ascii_preview, CommandWriter};

/// Primary GATT service advertised by the camera.
pub const SERVICE_UUID: &str = "1b7e8251-2877-41c3-b46e-cf057c562023";

/// Characteristic the camera sends notifications on.
pub const NOTIFY_CHAR_UUID: &str = "8ac32d3f-5cb9-4d44-bec2-ee689169f626";

/// Characteristic commands are written to.
pub const COMMAND_CHAR_UUID: &str = "5e9bf2a8-f93f-4481-a67e-3b2f4a07891a";
