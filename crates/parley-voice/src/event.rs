//! Events pushed by a voice backend during a call.

use serde::{Deserialize, Serialize};

/// One event from the voice backend's event stream.
///
/// On the wire each event is a JSON object tagged by `event`, e.g.
/// `{"event":"agent_start_talking"}` or
/// `{"event":"update","transcript":"Hello"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum VoiceEvent {
    CallStarted,
    CallEnded,
    AgentStartTalking,
    AgentStopTalking,
    #[serde(rename = "update")]
    TranscriptUpdate {
        #[serde(default)]
        transcript: String,
    },
    Error {
        message: String,
    },
}

impl VoiceEvent {
    pub fn transcript(text: impl Into<String>) -> Self {
        Self::TranscriptUpdate {
            transcript: text.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CallStarted => "call_started",
            Self::CallEnded => "call_ended",
            Self::AgentStartTalking => "agent_start_talking",
            Self::AgentStopTalking => "agent_stop_talking",
            Self::TranscriptUpdate { .. } => "update",
            Self::Error { .. } => "error",
        }
    }
}
