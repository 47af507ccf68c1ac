use std::time::Duration;

use snapcam_frame::FrameConfig;

/// How long each wait for a notification may take.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Whole-command attempts before a timeout is surfaced.
pub const MAX_SEND_RETRY: u32 = 3;

/// Configuration for a command session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Timeout for each blocking wait (per-frame ack or response sub-frame).
    pub response_timeout: Duration,
    /// Attempts per command; only timeouts consume extra attempts.
    /// Zero is treated as one.
    pub max_send_attempts: u32,
    /// Outbound frame splitting.
    pub frame: FrameConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            max_send_attempts: MAX_SEND_RETRY,
            frame: FrameConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_camera_firmware() {
        let config = SessionConfig::default();
        assert_eq!(config.response_timeout, Duration::from_secs(5));
        assert_eq!(config.max_send_attempts, 3);
        assert_eq!(config.frame.max_frame_size, 20);
    }
}
