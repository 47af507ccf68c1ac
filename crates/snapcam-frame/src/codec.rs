use bytes::{BufMut, Bytes, BytesMut};
use serde_json::{Map, Value};

use crate::command::Command;
use crate::error::{FrameError, Result};

/// First byte of every message.
pub const START_BYTE: u8 = 0xFF;

/// Largest attribute write the camera accepts.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 20;

/// Marker preceding the checksum digit.
pub const CRC_PREFIX: &[u8] = b"CRC:";

/// `CRC:` plus one hex digit.
pub const CRC_TRAILER_LEN: usize = CRC_PREFIX.len() + 1;

/// Written by the host to ask for the next response chunk; also what the
/// camera sends back per received frame.
pub const ACK_FRAME: &[u8] = b"{\"ret\":1}";

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Configuration for message splitting.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum frame size in bytes. Default: 20.
    pub max_frame_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Low nibble of the byte sum of `payload`.
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b)) & 0x0f
}

/// [`checksum`] as its lowercase hex digit.
pub fn checksum_digit(payload: &[u8]) -> u8 {
    HEX_DIGITS[usize::from(checksum(payload))]
}

/// Encode a payload into the full (unsplit) message.
///
/// Wire format:
/// ```text
/// ┌──────┬──────────────────┬──────────────┬──────────────┐
/// │ 0xFF │ len (ASCII hex,  │ JSON payload │ "CRC:" + hex │
/// │ (1B) │ lowercase, no    │ (len bytes)  │ digit (5B)   │
/// │      │ padding)         │              │              │
/// └──────┴──────────────────┴──────────────┴──────────────┘
/// ```
pub fn encode_message(payload: &[u8], dst: &mut BytesMut) {
    let len_hex = format!("{:x}", payload.len());
    dst.reserve(1 + len_hex.len() + payload.len() + CRC_TRAILER_LEN);
    dst.put_u8(START_BYTE);
    dst.put_slice(len_hex.as_bytes());
    dst.put_slice(payload);
    dst.put_slice(CRC_PREFIX);
    dst.put_u8(checksum_digit(payload));
}

/// Cut a message into consecutive frames of at most `max_frame_size` bytes.
pub fn split_frames(message: Bytes, max_frame_size: usize) -> Result<Vec<Bytes>> {
    if max_frame_size == 0 {
        return Err(FrameError::InvalidFrameSize(max_frame_size));
    }

    let mut frames = Vec::with_capacity(message.len().div_ceil(max_frame_size));
    let mut offset = 0usize;
    while offset < message.len() {
        let end = (offset + max_frame_size).min(message.len());
        frames.push(message.slice(offset..end));
        offset = end;
    }
    Ok(frames)
}

/// Encode a command into the frames to write, in order.
pub fn encode_command(command: &Command, config: &FrameConfig) -> Result<Vec<Bytes>> {
    let payload = command.to_json_bytes()?;
    let mut message = BytesMut::new();
    encode_message(&payload, &mut message);
    split_frames(message.freeze(), config.max_frame_size)
}

/// Encode `opcode` and `args` with the default 20-byte frame size.
pub fn encode(opcode: u8, args: &Map<String, Value>) -> Result<Vec<Bytes>> {
    encode_command(
        &Command::with_args(opcode, args.clone()),
        &FrameConfig::default(),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn concat(frames: &[Bytes]) -> Vec<u8> {
        frames.iter().flat_map(|f| f.iter().copied()).collect()
    }

    #[test]
    fn firmware_query_fits_one_frame() {
        let frames = encode(25, &Map::new()).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), b"\xffb{\"Type\":25}CRC:f");
        assert_eq!(frames[0].len(), 18);
    }

    #[test]
    fn checksum_is_low_nibble_of_sum() {
        assert_eq!(checksum(b""), 0);
        assert_eq!(checksum_digit(b""), b'0');
        assert_eq!(checksum(&[0x0f]), 0x0f);
        assert_eq!(checksum(&[0xff, 0x02]), 0x01);
        assert_eq!(checksum_digit(br#"{"Type":25}"#), b'f');

        let payload = br#"{"Name":"SnapCam","Type":2}"#;
        let sum: u32 = payload.iter().map(|&b| u32::from(b)).sum();
        assert_eq!(u32::from(checksum(payload)), sum & 0xf);
    }

    #[test]
    fn two_digit_length_header() {
        let cmd = Command::new(2).arg("Name", "abcdefghij");
        let payload = cmd.to_json_bytes().unwrap();
        assert_eq!(payload.len(), 30);

        let frames = encode_command(&cmd, &FrameConfig::default()).unwrap();
        let wire = concat(&frames);
        assert_eq!(&wire[..4], b"\xff1e{");
        assert_eq!(wire.len(), 1 + 2 + 30 + CRC_TRAILER_LEN);
    }

    #[test]
    fn frames_bounded_and_concatenate_to_message() {
        let cmd = Command::from_value(
            2,
            json!({"Name": "a fairly long device name that spans frames"}),
        )
        .unwrap();
        let frames = encode_command(&cmd, &FrameConfig::default()).unwrap();

        let mut expected = BytesMut::new();
        encode_message(&cmd.to_json_bytes().unwrap(), &mut expected);

        assert!(frames.len() > 1);
        assert!(frames.iter().all(|f| f.len() <= DEFAULT_MAX_FRAME_SIZE));
        assert!(frames[..frames.len() - 1]
            .iter()
            .all(|f| f.len() == DEFAULT_MAX_FRAME_SIZE));
        assert_eq!(concat(&frames), expected.to_vec());
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let message = Bytes::from(vec![0xAB; 40]);
        let frames = split_frames(message, 20).unwrap();
        assert_eq!(frames.len(), 2);
        assert!(split_frames(Bytes::new(), 20).unwrap().is_empty());
    }

    #[test]
    fn custom_frame_size() {
        let config = FrameConfig { max_frame_size: 7 };
        let frames = encode_command(&Command::new(14), &config).unwrap();
        assert!(frames.iter().all(|f| f.len() <= 7));
        assert_eq!(concat(&frames), b"\xffb{\"Type\":14}CRC:d".to_vec());
    }

    #[test]
    fn zero_frame_size_rejected() {
        let err = split_frames(Bytes::from_static(b"x"), 0).unwrap_err();
        assert!(matches!(err, FrameError::InvalidFrameSize(0)));
    }

    #[test]
    fn long_payload_gets_three_digit_length() {
        let cmd = Command::new(2).arg("Name", "x".repeat(300));
        let frames = encode_command(&cmd, &FrameConfig::default()).unwrap();
        let wire = concat(&frames);
        let len = cmd.to_json_bytes().unwrap().len();
        assert_eq!(&wire[1..4], format!("{len:x}").as_bytes());
    }
}
