//! Backend-free demo calls.

use crate::backend::{BackendKind, CallHandle, CallParams, EventSubscription, VoiceBackend};
use crate::error::VoiceError;
use crate::event::VoiceEvent;
use crate::script::{Script, ScriptHandle};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::info;

struct SimulatedCall {
    call_id: String,
    tx: mpsc::Sender<VoiceEvent>,
    playback: ScriptHandle,
}

/// A [`VoiceBackend`] that fabricates a conversation from a [`Script`].
///
/// `start_call` always succeeds: it emits `call_started` and begins playing
/// the script. `stop_call` cancels playback and emits `call_ended`.
pub struct SimulatedBackend {
    script: Script,
    active: Mutex<HashMap<CallHandle, SimulatedCall>>,
}

impl SimulatedBackend {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Uses [`Script::demo`].
    pub fn demo() -> Self {
        Self::new(Script::demo())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CallHandle, SimulatedCall>> {
        // A panic while holding this lock cannot leave the Option half-written.
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::demo()
    }
}

#[async_trait]
impl VoiceBackend for SimulatedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Simulated
    }

    async fn start_call(&self, params: &CallParams) -> Result<EventSubscription, VoiceError> {
        let (tx, subscription) = EventSubscription::channel();
        tx.try_send(VoiceEvent::CallStarted)
            .map_err(|e| VoiceError::Protocol(format!("failed to queue call_started: {e}")))?;
        let playback = self.script.play(tx.clone());

        info!(call_id = %params.call_id, steps = self.script.steps().len(), "simulated call started");

        self.lock().insert(
            subscription.handle(),
            SimulatedCall {
                call_id: params.call_id.clone(),
                tx,
                playback,
            },
        );

        Ok(subscription)
    }

    async fn stop_call(&self, call: CallHandle) {
        let Some(call) = self.lock().remove(&call) else {
            return;
        };
        call.playback.cancel();
        // The subscriber may already be gone; that is fine.
        let _ = call.tx.try_send(VoiceEvent::CallEnded);
        info!(call_id = %call.call_id, "simulated call stopped");
    }

    fn mute(&self, call: CallHandle) {
        if let Some(call) = self.lock().get(&call) {
            info!(call_id = %call.call_id, "simulated microphone muted");
        }
    }

    fn unmute(&self, call: CallHandle) {
        if let Some(call) = self.lock().get(&call) {
            info!(call_id = %call.call_id, "simulated microphone unmuted");
        }
    }
}
