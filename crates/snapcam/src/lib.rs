//! Control BLE action cameras that speak the snapcam command protocol.
//!
//! Commands are JSON objects tagged with an opcode, wrapped in a
//! `0xFF`/length/`CRC:` envelope and written to a GATT characteristic in
//! 20-byte frames. Replies come back as notifications and are acknowledged
//! chunk by chunk.
//!
//! # Crate Structure
//!
//! - [`transport`]: command writer seam, notification queue, GATT UUIDs
//! - [`frame`]: message encoding, frame splitting, response reassembly
//! - [`session`]: ack/retry state machine, typed camera API, simulator
//!   (behind the `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use snapcam_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use snapcam_frame::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use snapcam_session::*;
}
