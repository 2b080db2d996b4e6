//! The capability surface every voice backend exposes.

use crate::error::VoiceError;
use crate::event::VoiceEvent;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Buffered events per call before a slow consumer applies backpressure.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Which implementation is behind a [`VoiceBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Real,
    Simulated,
}

/// Names one call started on a backend.
///
/// Every [`EventSubscription`] carries a fresh handle. Stopping, muting, and
/// unmuting address a call by its handle, so a call that finished setting up
/// late can be released without touching any other call on the same backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallHandle(u64);

impl CallHandle {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call#{}", self.0)
    }
}

/// Credentials for joining a web call, as minted by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallParams {
    pub access_token: String,
    pub call_id: String,
}

/// Receiving end of one call's event stream.
///
/// The subscription belongs to whoever started the call. Dropping it
/// releases the stream; backends treat a closed stream as "nobody is
/// listening" and stop delivering.
#[derive(Debug)]
pub struct EventSubscription {
    handle: CallHandle,
    rx: mpsc::Receiver<VoiceEvent>,
}

impl EventSubscription {
    /// Creates a connected sender/subscription pair for a new call.
    pub fn channel() -> (mpsc::Sender<VoiceEvent>, Self) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let handle = CallHandle::next();
        (tx, Self { handle, rx })
    }

    /// The call this stream belongs to.
    pub fn handle(&self) -> CallHandle {
        self.handle
    }

    /// Waits for the next event. `None` means the backend closed the stream.
    pub async fn recv(&mut self) -> Option<VoiceEvent> {
        self.rx.recv().await
    }
}

/// A voice call transport as seen by the call coordinator.
#[async_trait]
pub trait VoiceBackend: Send + Sync {
    /// Sessions on a [`BackendKind::Simulated`] backend are flagged as demo calls.
    fn kind(&self) -> BackendKind;

    /// Starts a call and returns its event stream.
    async fn start_call(&self, params: &CallParams) -> Result<EventSubscription, VoiceError>;

    /// Hangs up `call`. Unknown or already stopped calls are a no-op.
    async fn stop_call(&self, call: CallHandle);

    fn mute(&self, call: CallHandle);

    fn unmute(&self, call: CallHandle);
}
