//! Client side of a Parley voice call.
//!
//! [`CallCoordinator`] owns the call state machine. It checks availability,
//! obtains credentials, drives a [`VoiceBackend`](parley_voice::VoiceBackend),
//! toggles the speaking [`AudioCue`], and writes transcript entries. Every
//! external dependency sits behind a trait in [`services`], and
//! [`ServiceClient`] implements them against the Parley HTTP service.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod cue;
pub mod error;
pub mod services;
pub mod transcript;

pub use client::{ServiceClient, UploadReceipt, DEFAULT_AVAILABILITY_TIMEOUT};
pub use coordinator::{CallCoordinator, CallServices, Command, CoordinatorConfig, CoordinatorHandle};
pub use cue::{AudioCue, CuePlayer, CueStatus, LogCuePlayer, PlaybackError};
pub use error::{classify, classify_message, CallError, CallErrorKind, ClientError};
pub use services::{AvailabilityCheck, CredentialSource, TranscriptLogger};
pub use transcript::{TranscriptQueue, TranscriptWriter};
