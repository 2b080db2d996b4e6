//! Errors raised while running a call, and the one place they are classified.

use parley_voice::VoiceError;
use serde::Serialize;
use thiserror::Error;

/// Failures talking to the Parley HTTP service.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid service URL '{url}': {reason}")]
    BaseUrl { url: String, reason: String },

    /// The service answered 503.
    #[error("service unavailable: {details}")]
    Unavailable { details: String },

    #[error("service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("no user identity; call identify() first")]
    Unidentified,
}

/// Anything that can stop a call from being set up or kept alive.
#[derive(Error, Debug)]
pub enum CallError {
    #[error(transparent)]
    Voice(#[from] VoiceError),

    #[error(transparent)]
    Service(#[from] ClientError),
}

/// What a failure means for the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallErrorKind {
    /// The backend cannot be reached or refuses service; a retry may help.
    BackendUnavailable,
    /// The platform refused microphone access.
    PermissionDenied,
    ProtocolError,
    /// A transcript entry could not be written. Never surfaced to the user.
    LoggingFailure,
}

impl CallErrorKind {
    /// Message shown in the call status for this kind of failure.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::BackendUnavailable => {
                "The voice service is currently unavailable. Please try again later."
            }
            Self::PermissionDenied => {
                "Microphone access was denied. Grant permission and try again."
            }
            Self::ProtocolError => "Something went wrong with the call. Please try again.",
            Self::LoggingFailure => "Failed to save the conversation.",
        }
    }
}

const UNAVAILABLE_MARKERS: &[&str] = &[
    "network",
    "timeout",
    "timed out",
    "connection refused",
    "service unavailable",
    "failed to fetch",
    "503",
];

const PERMISSION_MARKERS: &[&str] = &[
    "permission denied",
    "notallowederror",
    "microphone access",
    "microphone permission",
    "mic access",
];

/// Maps a call failure onto a [`CallErrorKind`].
///
/// Typed variants decide first; only errors that carry nothing but text fall
/// through to message matching.
pub fn classify(err: &CallError) -> CallErrorKind {
    match err {
        CallError::Service(ClientError::Unavailable { .. }) => CallErrorKind::BackendUnavailable,
        CallError::Service(ClientError::Request(e)) if e.is_timeout() || e.is_connect() => {
            CallErrorKind::BackendUnavailable
        }
        CallError::Service(ClientError::Status { status: 503, .. }) => {
            CallErrorKind::BackendUnavailable
        }
        CallError::Voice(
            VoiceError::Connect(_) | VoiceError::Timeout(_) | VoiceError::Unavailable(_),
        ) => CallErrorKind::BackendUnavailable,
        CallError::Voice(VoiceError::PermissionDenied(_)) => CallErrorKind::PermissionDenied,
        other => classify_message(&other.to_string()),
    }
}

/// Text-only classification, used for errors reported by the backend as a
/// bare message.
pub fn classify_message(message: &str) -> CallErrorKind {
    let lowered = message.to_lowercase();
    if PERMISSION_MARKERS.iter().any(|m| lowered.contains(m)) {
        CallErrorKind::PermissionDenied
    } else if UNAVAILABLE_MARKERS.iter().any(|m| lowered.contains(m)) {
        CallErrorKind::BackendUnavailable
    } else {
        CallErrorKind::ProtocolError
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn typed_voice_errors_classify_without_text() {
        let cases = [
            (VoiceError::Connect("x".into()), CallErrorKind::BackendUnavailable),
            (
                VoiceError::Timeout(Duration::from_secs(3)),
                CallErrorKind::BackendUnavailable,
            ),
            (VoiceError::Unavailable("x".into()), CallErrorKind::BackendUnavailable),
            (VoiceError::PermissionDenied("x".into()), CallErrorKind::PermissionDenied),
        ];
        for (err, kind) in cases {
            assert_eq!(classify(&err.into()), kind);
        }
    }

    #[test]
    fn service_unavailable_is_retryable() {
        let err = CallError::from(ClientError::Unavailable {
            details: "no api key".into(),
        });
        assert_eq!(classify(&err), CallErrorKind::BackendUnavailable);

        let err = CallError::from(ClientError::Status {
            status: 503,
            message: "busy".into(),
        });
        assert_eq!(classify(&err), CallErrorKind::BackendUnavailable);
    }

    #[test]
    fn protocol_errors_fall_back_to_message_matching() {
        let err = CallError::from(VoiceError::Protocol("NotAllowedError: denied".into()));
        assert_eq!(classify(&err), CallErrorKind::PermissionDenied);

        let err = CallError::from(VoiceError::Protocol("unexpected frame".into()));
        assert_eq!(classify(&err), CallErrorKind::ProtocolError);
    }

    #[test]
    fn message_matching_is_case_insensitive() {
        assert_eq!(
            classify_message("Failed to fetch"),
            CallErrorKind::BackendUnavailable
        );
        assert_eq!(
            classify_message("upstream said SERVICE UNAVAILABLE"),
            CallErrorKind::BackendUnavailable
        );
        assert_eq!(
            classify_message("Microphone access blocked by the browser"),
            CallErrorKind::PermissionDenied
        );
        assert_eq!(classify_message("bad frame"), CallErrorKind::ProtocolError);
    }

    #[test]
    fn busy_microphone_is_not_a_permission_problem() {
        assert_eq!(
            classify_message("Microphone is in use"),
            CallErrorKind::ProtocolError
        );
        assert_eq!(
            classify_message("microphone device not found"),
            CallErrorKind::ProtocolError
        );
        assert_eq!(
            classify_message("Mic access was refused"),
            CallErrorKind::PermissionDenied
        );
    }

    #[test]
    fn permission_message_is_actionable() {
        assert_eq!(
            CallErrorKind::PermissionDenied.user_message(),
            "Microphone access was denied. Grant permission and try again."
        );
        assert_ne!(
            CallErrorKind::PermissionDenied.user_message(),
            CallErrorKind::ProtocolError.user_message()
        );
    }
}
