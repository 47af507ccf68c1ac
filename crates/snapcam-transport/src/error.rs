/// Errors that can occur at the BLE transport boundary.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Writing to the command characteristic failed.
    #[error("command characteristic write failed: {0}")]
    Write(String),

    /// An I/O error reported by the underlying BLE stack.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link to the camera is gone.
    #[error("not connected")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, TransportError>;
