/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No notification arrived within the response timeout.
    #[error("timed out waiting for BLE notification after {0:?}")]
    Timeout(std::time::Duration),

    /// Frame-level error (bad header, bad CRC marker, malformed JSON).
    #[error("frame error: {0}")]
    Frame(#[from] snapcam_frame::FrameError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] snapcam_transport::TransportError),

    /// The response parsed but lacks a field the operation needs.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A clock value the camera cannot represent.
    #[error(transparent)]
    Clock(#[from] crate::camera::InvalidClockTime),

    /// A capture mode is already active.
    #[error("camera busy: {0}")]
    Busy(String),
}

impl SessionError {
    /// True for the one condition the retry loop recovers from.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
