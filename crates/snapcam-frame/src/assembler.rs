use bytes::BytesMut;
use serde_json::Value;
use tracing::trace;

use crate::codec::{CRC_PREFIX, CRC_TRAILER_LEN, START_BYTE};
use crate::error::{FrameError, Result};

const JSON_START: u8 = b'{';

/// Location of the payload inside the first response sub-frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Payload length declared by the peer, in bytes.
    pub declared_len: usize,
    /// Offset of the first payload byte (`{`) in the first sub-frame.
    pub payload_offset: usize,
}

impl ResponseHeader {
    /// Bytes that must be collected after the header: payload plus `CRC:X`.
    pub fn body_len(&self) -> usize {
        self.declared_len + CRC_TRAILER_LEN
    }
}

/// Parse the header of the first response sub-frame.
///
/// The length field is variable width, so the JSON start is looked for at offset
/// 2 (one hex digit) and then offset 3 (two hex digits). Longer length fields
/// are not recognised and fail like any other malformed header.
pub fn parse_header(first: &[u8]) -> Result<ResponseHeader> {
    if first.first() != Some(&START_BYTE) {
        return Err(FrameError::BadFrameHeader);
    }

    let payload_offset = if first.get(2) == Some(&JSON_START) {
        2
    } else if first.get(3) == Some(&JSON_START) {
        3
    } else {
        return Err(FrameError::BadFrameHeader);
    };

    let digits = &first[1..payload_offset];
    if !digits.iter().all(u8::is_ascii_hexdigit) {
        return Err(FrameError::BadFrameHeader);
    }
    let declared_len = std::str::from_utf8(digits)
        .ok()
        .and_then(|digits| usize::from_str_radix(digits, 16).ok())
        .ok_or(FrameError::BadFrameHeader)?;

    Ok(ResponseHeader {
        declared_len,
        payload_offset,
    })
}

/// Collects response sub-frames until the declared length is reached.
///
/// Chunk boundaries are chosen by the peer, so callers feed whatever each
/// notification carried and ask [`ResponseAssembler::is_complete`] whether to
/// request another one.
#[derive(Debug)]
pub struct ResponseAssembler {
    header: ResponseHeader,
    body: BytesMut,
}

impl ResponseAssembler {
    /// Start from the first sub-frame, which carries the header.
    pub fn start(first: &[u8]) -> Result<Self> {
        let header = parse_header(first)?;
        let mut body = BytesMut::with_capacity(header.body_len());
        body.extend_from_slice(&first[header.payload_offset..]);
        Ok(Self { header, body })
    }

    /// Append a follow-up sub-frame (no header).
    pub fn push(&mut self, subframe: &[u8]) {
        self.body.extend_from_slice(subframe);
    }

    /// Parsed header of the first sub-frame.
    pub fn header(&self) -> ResponseHeader {
        self.header
    }

    /// Bytes collected so far, header excluded.
    pub fn collected(&self) -> usize {
        self.body.len()
    }

    /// True once payload and CRC marker are all here.
    pub fn is_complete(&self) -> bool {
        self.body.len() >= self.header.body_len()
    }

    /// Validate the CRC marker and parse the JSON payload.
    ///
    /// The checksum digit itself is not compared against the payload.
    pub fn finish(self) -> Result<Value> {
        if !self.is_complete() {
            return Err(FrameError::Incomplete {
                have: self.body.len(),
                need: self.header.body_len(),
            });
        }

        let split = self.body.len() - CRC_TRAILER_LEN;
        let (payload, trailer) = self.body.split_at(split);
        if !trailer.starts_with(CRC_PREFIX) {
            return Err(FrameError::BadCrcFormat);
        }
        trace!(
            declared = self.header.declared_len,
            received = payload.len(),
            crc = %char::from(trailer[CRC_PREFIX.len()]),
            "response reassembled"
        );

        serde_json::from_slice(payload).map_err(FrameError::MalformedResponse)
    }
}

/// Decode a complete response from its sub-frames, first one included.
pub fn decode_response<T: AsRef<[u8]>>(subframes: &[T]) -> Result<Value> {
    let (first, rest) = subframes.split_first().ok_or(FrameError::BadFrameHeader)?;
    let mut assembler = ResponseAssembler::start(first.as_ref())?;
    for subframe in rest {
        if assembler.is_complete() {
            break;
        }
        assembler.push(subframe.as_ref());
    }
    assembler.finish()
}
