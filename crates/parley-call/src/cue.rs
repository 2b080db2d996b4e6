//! The looping "agent is speaking" audio cue.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// The platform refuses to play audio until the user interacts.
    #[error("playback blocked: {0}")]
    Blocked(String),

    #[error("playback failed: {0}")]
    Failed(String),
}

/// Platform audio output for the cue.
pub trait CuePlayer: Send + Sync {
    /// Starts looping playback from the beginning.
    fn play(&self) -> Result<(), PlaybackError>;

    /// Halts playback and rewinds to the start.
    fn halt(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CueStatus {
    #[default]
    Stopped,
    Playing,
    /// Blocked by the platform; retried on the next user interaction.
    Deferred,
    Failed,
}

/// Idempotent start/stop wrapper around a [`CuePlayer`].
///
/// Neither operation reports errors to the caller: a blocked start degrades
/// to [`CueStatus::Deferred`] and any other failure to [`CueStatus::Failed`].
pub struct AudioCue {
    player: Arc<dyn CuePlayer>,
    status: CueStatus,
    retry_armed: bool,
}

impl AudioCue {
    pub fn new(player: Arc<dyn CuePlayer>) -> Self {
        Self {
            player,
            status: CueStatus::Stopped,
            retry_armed: false,
        }
    }

    pub fn status(&self) -> CueStatus {
        self.status
    }

    /// True while a blocked start waits for a user interaction.
    pub fn retry_armed(&self) -> bool {
        self.retry_armed
    }

    /// Starts the cue. A no-op while it is already playing or deferred.
    pub fn start(&mut self) -> CueStatus {
        if matches!(self.status, CueStatus::Playing | CueStatus::Deferred) {
            return self.status;
        }
        self.status = self.attempt();
        self.retry_armed = self.status == CueStatus::Deferred;
        self.status
    }

    /// Halts and rewinds the cue, and disarms any pending retry. This also
    /// returns the cue to its initial state between sessions.
    pub fn stop(&mut self) {
        self.retry_armed = false;
        if self.status == CueStatus::Playing {
            self.player.halt();
        }
        self.status = CueStatus::Stopped;
    }

    /// Fires the pending deferred start, if any. The retry is one-shot: a
    /// second block leaves the cue failed rather than re-arming.
    pub fn on_user_interaction(&mut self) -> CueStatus {
        if !self.retry_armed {
            return self.status;
        }
        self.retry_armed = false;
        self.status = match self.attempt() {
            CueStatus::Deferred => CueStatus::Failed,
            other => other,
        };
        debug!(status = ?self.status, "deferred cue retried");
        self.status
    }

    fn attempt(&self) -> CueStatus {
        match self.player.play() {
            Ok(()) => CueStatus::Playing,
            Err(PlaybackError::Blocked(reason)) => {
                info!(%reason, "cue playback deferred until user interaction");
                CueStatus::Deferred
            }
            Err(e) => {
                warn!(error = %e, "cue playback failed");
                CueStatus::Failed
            }
        }
    }
}

/// [`CuePlayer`] for terminals: records start and stop in the log.
#[derive(Debug, Default)]
pub struct LogCuePlayer;

impl CuePlayer for LogCuePlayer {
    fn play(&self) -> Result<(), PlaybackError> {
        info!("speaking cue on");
        Ok(())
    }

    fn halt(&self) {
        info!("speaking cue off");
    }
}
