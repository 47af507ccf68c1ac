/// Errors that can occur during message encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The first sub-frame does not start with `0xFF` followed by a one or two
    /// digit hex length and `{`.
    #[error("bad frame header (expected 0xFF, 1-2 hex length digits, '{{')")]
    BadFrameHeader,

    /// The reassembled message does not end in a `CRC:` marker.
    #[error("bad CRC marker (expected trailing \"CRC:<hex>\")")]
    BadCrcFormat,

    /// The payload between header and CRC marker is not valid JSON.
    #[error("malformed response payload: {0}")]
    MalformedResponse(#[source] serde_json::Error),

    /// The command could not be serialized.
    #[error("command encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Command arguments must form a JSON object.
    #[error("command arguments must be a JSON object, got {0}")]
    InvalidArgs(&'static str),

    /// The configured frame size cannot carry any data.
    #[error("invalid max frame size {0}")]
    InvalidFrameSize(usize),

    /// Fewer bytes were collected than the header declared.
    #[error("incomplete response ({have} of {need} bytes)")]
    Incomplete { have: usize, need: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
