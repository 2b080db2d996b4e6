//! Call lifecycle states and the status snapshot shown to the user.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a call that reached a terminal state ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Success,
    Error,
}

/// States of a single call session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    /// No call; ready to start one.
    #[default]
    Idle,
    /// Waiting for the availability check.
    CheckingAvailability,
    /// The voice backend cannot take calls; only a retry is possible.
    Unavailable,
    /// Credentials are being fetched and the backend is connecting.
    Starting,
    /// Connected; the agent is not speaking.
    ActiveListening,
    /// Connected; the agent is speaking and the audio cue plays.
    ActiveAgentSpeaking,
    /// Stop requested; waiting for the backend to hang up.
    Ending,
    Ended(CallOutcome),
}

impl CallState {
    /// Returns true while a session is in flight (not idle, unavailable, or ended).
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            Self::CheckingAvailability
                | Self::Starting
                | Self::ActiveListening
                | Self::ActiveAgentSpeaking
                | Self::Ending
        )
    }

    /// Returns true for the two connected states.
    pub fn is_active(self) -> bool {
        matches!(self, Self::ActiveListening | Self::ActiveAgentSpeaking)
    }

    pub fn is_ended(self) -> bool {
        matches!(self, Self::Ended(_))
    }

    /// Returns true when a new call may be requested from this state.
    pub fn can_start(self) -> bool {
        matches!(self, Self::Idle | Self::Ended(_))
    }
}

/// Colour of the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTone {
    #[default]
    Info,
    Success,
    Error,
}

/// Snapshot of the coordinator published after every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStatus {
    pub state: CallState,
    /// Short user-facing message.
    pub message: String,
    pub tone: StatusTone,
    /// Current session, if one has been created.
    pub session_id: Option<Uuid>,
    /// True while the session runs against the simulated backend.
    pub simulated: bool,
    pub muted: bool,
    /// True when the UI should offer a retry action.
    pub retry_available: bool,
}

impl Default for CallStatus {
    fn default() -> Self {
        Self {
            state: CallState::Idle,
            message: "Tap to start call".to_string(),
            tone: StatusTone::Info,
            session_id: None,
            simulated: false,
            muted: false,
            retry_available: false,
        }
    }
}
