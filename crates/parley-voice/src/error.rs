use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The backend could not be reached at all.
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("voice backend timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The provider answered but reported that it cannot serve calls.
    #[error("voice service unavailable: {0}")]
    Unavailable(String),

    /// The platform refused microphone access.
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("voice API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid response from voice API: {0}")]
    InvalidResponse(String),

    /// The event channel misbehaved (unexpected frame, handshake rejected).
    #[error("protocol error: {0}")]
    Protocol(String),
}
