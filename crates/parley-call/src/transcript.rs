//! Ordered, best-effort transcript writes.
//!
//! The coordinator must never wait on the network, yet entries have to land
//! in the order they were produced. [`TranscriptQueue`] hands entries to a
//! single writer task that appends them one at a time.

use crate::error::CallErrorKind;
use crate::services::TranscriptLogger;
use parley_types::TranscriptRole;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

struct Pending {
    role: TranscriptRole,
    message: String,
}

/// Sending half of the transcript writer.
pub struct TranscriptQueue {
    tx: mpsc::UnboundedSender<Pending>,
}

/// Writer half; run it with [`TranscriptWriter::run`].
pub struct TranscriptWriter {
    logger: Arc<dyn TranscriptLogger>,
    rx: mpsc::UnboundedReceiver<Pending>,
}

impl TranscriptQueue {
    pub fn new(logger: Arc<dyn TranscriptLogger>) -> (Self, TranscriptWriter) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, TranscriptWriter { logger, rx })
    }

    pub fn push(&self, role: TranscriptRole, message: impl Into<String>) {
        let pending = Pending {
            role,
            message: message.into(),
        };
        if self.tx.send(pending).is_err() {
            warn!(%role, "transcript writer has stopped, entry dropped");
        }
    }
}

impl TranscriptWriter {
    /// Writes entries until every [`TranscriptQueue`] is dropped and the
    /// backlog is drained.
    pub async fn run(mut self) {
        while let Some(Pending { role, message }) = self.rx.recv().await {
            match self.logger.append(role, &message).await {
                Ok(()) => debug!(%role, "transcript entry saved"),
                Err(e) => warn!(
                    %role,
                    kind = ?CallErrorKind::LoggingFailure,
                    error = %e,
                    "failed to save transcript entry"
                ),
            }
        }
    }
}
