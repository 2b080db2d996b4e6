//! Shared types for the Parley voice-conversation service.
//!
//! Both the HTTP server and the call client depend on this crate for the
//! wire shapes they exchange: transcript entries, uploaded file summaries,
//! availability responses, and the call-state snapshot published by the
//! coordinator. Keeping them here means the server and the client cannot
//! drift apart on field names.

pub mod call;

pub use call::{CallOutcome, CallState, CallStatus, StatusTone};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Who a transcript line is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    /// Something the user did (e.g. uploading a file).
    User,
    /// Call lifecycle markers such as "Call started".
    System,
    /// A line spoken by the AI agent.
    Ai,
    /// A transcript update pushed by the voice backend.
    Transcript,
}

impl TranscriptRole {
    /// All roles, in the order they are accepted by the database check constraint.
    pub const ALL: [TranscriptRole; 4] = [Self::User, Self::System, Self::Ai, Self::Transcript];

    /// Returns the storage label for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::System => "system",
            Self::Ai => "ai",
            Self::Transcript => "transcript",
        }
    }
}

impl fmt::Display for TranscriptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known transcript role.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown transcript role: {0}")]
pub struct ParseRoleError(pub String);

impl FromStr for TranscriptRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "system" => Ok(Self::System),
            "ai" => Ok(Self::Ai),
            "transcript" => Ok(Self::Transcript),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

/// One persisted line of a user's conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    /// Database row ID. Increases with insertion order.
    pub id: i64,
    /// Anonymous identity the entry belongs to.
    pub user_id: String,
    pub role: TranscriptRole,
    pub message: String,
    /// ISO-8601 UTC timestamp with millisecond precision.
    pub timestamp: String,
}

/// Result of asking whether the voice backend can currently take calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityStatus {
    pub available: bool,
    /// Why the backend is unusable. Always `None` when `available` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AvailabilityStatus {
    pub fn available() -> Self {
        Self {
            available: true,
            reason: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
        }
    }
}

/// A stored upload, including the derived markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub id: i64,
    pub user_id: String,
    /// Sanitized original filename.
    pub filename: String,
    pub content_markdown: String,
    pub timestamp: String,
}

/// Listing view of an upload; omits the stored content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub id: i64,
    pub filename: String,
    pub timestamp: String,
}

impl From<UploadedFile> for UploadSummary {
    fn from(file: UploadedFile) -> Self {
        Self {
            id: file.id,
            filename: file.filename,
            timestamp: file.timestamp,
        }
    }
}
