//! Command opcodes understood by the camera.
//!
//! Opcodes travel as the `"Type"` field of the command object. Opcodes not
//! listed here can still be sent; the camera decides what to do with them.

/// Toggle auto-rotation (`AutoRotation`: `"On"` / `"Off"`).
pub const AUTO_ROTATION: u8 = 1;

/// Rename the device (`Name`).
pub const SET_DEVICE_NAME: u8 = 2;

/// Select video resolution (`VideoMode`).
pub const SET_VIDEO_MODE: u8 = 4;

/// Select photo resolution (`PhotoMode`).
pub const SET_PHOTO_MODE: u8 = 5;

/// Start video recording.
pub const START_VIDEO: u8 = 6;

/// Stop video recording.
pub const STOP_VIDEO: u8 = 7;

/// Set timelapse interval (`second`).
pub const SET_TIMELAPSE_INTERVAL: u8 = 11;

/// Start timelapse capture.
pub const START_TIMELAPSE: u8 = 12;

/// Stop timelapse capture.
pub const STOP_TIMELAPSE: u8 = 13;

/// Take a single picture.
pub const TAKE_PICTURE: u8 = 14;

/// Set the device clock (`time`: `YYYYMMDDHHMMSS`).
pub const SET_CLOCK: u8 = 15;

/// Query WiFi access point credentials.
pub const GET_WIFI_AP_INFO: u8 = 18;

/// Switch on the WiFi access point.
pub const ENABLE_WIFI: u8 = 22;

/// Query storage totals.
pub const GET_STORAGE_INFO: u8 = 24;

/// Query firmware version.
pub const GET_FIRMWARE_VERSION: u8 = 25;

/// Query battery level.
pub const GET_BATTERY_LEVEL: u8 = 27;

/// Query the WiFi IP address.
pub const GET_IP_ADDRESS: u8 = 29;

/// All known opcodes in ascending order.
pub const CATALOG: &[u8] = &[
    AUTO_ROTATION,
    SET_DEVICE_NAME,
    SET_VIDEO_MODE,
    SET_PHOTO_MODE,
    START_VIDEO,
    STOP_VIDEO,
    SET_TIMELAPSE_INTERVAL,
    START_TIMELAPSE,
    STOP_TIMELAPSE,
    TAKE_PICTURE,
    SET_CLOCK,
    GET_WIFI_AP_INFO,
    ENABLE_WIFI,
    GET_STORAGE_INFO,
    GET_FIRMWARE_VERSION,
    GET_BATTERY_LEVEL,
    GET_IP_ADDRESS,
];

/// Returns a human-readable name for an opcode.
pub fn opcode_name(opcode: u8) -> &'static str {
    match opcode {
        AUTO_ROTATION => "auto-rotation",
        SET_DEVICE_NAME => "set-device-name",
        SET_VIDEO_MODE => "set-video-mode",
        SET_PHOTO_MODE => "set-photo-mode",
        START_VIDEO => "start-video",
        STOP_VIDEO => "stop-video",
        SET_TIMELAPSE_INTERVAL => "set-timelapse-interval",
        START_TIMELAPSE => "start-timelapse",
        STOP_TIMELAPSE => "stop-timelapse",
        TAKE_PICTURE => "take-picture",
        SET_CLOCK => "set-clock",
        GET_WIFI_AP_INFO => "get-wifi-ap-info",
        ENABLE_WIFI => "enable-wifi",
        GET_STORAGE_INFO => "get-storage-info",
        GET_FIRMWARE_VERSION => "get-firmware-version",
        GET_BATTERY_LEVEL => "get-battery-level",
        GET_IP_ADDRESS => "get-ip-address",
        _ => "unknown",
    }
}

/// Returns true if the camera answers this opcode with a JSON response
/// beyond the per-frame acknowledgments.
pub fn expects_response(opcode: u8) -> bool {
    matches!(
        opcode,
        GET_WIFI_AP_INFO | GET_STORAGE_INFO | GET_FIRMWARE_VERSION | GET_BATTERY_LEVEL | GET_IP_ADDRESS
    )
}
