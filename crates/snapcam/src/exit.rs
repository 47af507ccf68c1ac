use std::fmt;
use std::io;

use snapcam_frame::FrameError;
use snapcam_session::SessionError;
use snapcam_transport::TransportError;

// Exit codes follow the sysexits/timeout(1) conventions.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotConnected | io::ErrorKind::BrokenPipe => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        TransportError::Disconnected => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    let code = match err {
        FrameError::BadFrameHeader
        | FrameError::BadCrcFormat
        | FrameError::MalformedResponse(_)
        | FrameError::Incomplete { .. } => DATA_INVALID,
        FrameError::InvalidArgs(_) | FrameError::InvalidFrameSize(_) => USAGE,
        FrameError::Encode(_) => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        SessionError::UnexpectedResponse(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        SessionError::Busy(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        SessionError::Clock(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn timeouts_map_to_124() {
        let err = session_error("simulate", SessionError::Timeout(Duration::from_secs(5)));
        assert_eq!(err.code, TIMEOUT);
        assert!(err.message.starts_with("simulate: "));
    }

    #[test]
    fn protocol_violations_are_data_invalid() {
        let err = session_error("decode", SessionError::Frame(FrameError::BadCrcFormat));
        assert_eq!(err.code, DATA_INVALID);
        let err = frame_error("decode", FrameError::Incomplete { have: 3, need: 9 });
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn bad_arguments_are_usage_errors() {
        assert_eq!(frame_error("encode", FrameError::InvalidArgs("array")).code, USAGE);
        assert_eq!(frame_error("encode", FrameError::InvalidFrameSize(0)).code, USAGE);
    }

    #[test]
    fn transport_write_failure() {
        let err = session_error(
            "send",
            SessionError::Transport(TransportError::Write("gatt 0x05".into())),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }
}
