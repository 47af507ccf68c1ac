//! Message framing for the snapcam BLE command protocol.
//!
//! Every message, in either direction, is laid out as:
//! - a `0xFF` start byte
//! - the payload length as lowercase ASCII hex, unpadded
//! - the UTF-8 JSON payload
//! - a `CRC:` marker followed by one hex digit (low nibble of the byte sum)
//!
//! Outbound messages are cut into frames of at most 20 bytes. Inbound
//! responses arrive as notification-sized sub-frames and are put back together
//! by [`ResponseAssembler`].

pub mod assembler;
pub mod codec;
pub mod command;
pub mod error;
pub mod opcode;

pub use assembler::{decode_response, parse_header, ResponseAssembler, ResponseHeader};
pub use codec::{
    checksum, checksum_digit, encode, encode_command, encode_message, split_frames, FrameConfig,
    ACK_FRAME, CRC_PREFIX, CRC_TRAILER_LEN, DEFAULT_MAX_FRAME_SIZE, START_BYTE,
};
pub use command::Command;
pub use error::{FrameError, Result};
pub use opcode::{expects_response, opcode_name, CATALOG};
