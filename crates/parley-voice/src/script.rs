//! Declarative timed event scripts for the simulated backend.
//!
//! A [`Script`] is a flat list of `(delay, event)` steps. Playing it spawns
//! exactly one task that sleeps and sends in order; cancelling the returned
//! [`ScriptHandle`] aborts that task, so no step can fire after a session
//! has ended.

use crate::event::VoiceEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One scripted event, fired `delay` after the previous step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptStep {
    pub delay: Duration,
    pub event: VoiceEvent,
}

impl ScriptStep {
    pub fn new(delay: Duration, event: VoiceEvent) -> Self {
        Self { delay, event }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    steps: Vec<ScriptStep>,
}

impl Script {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self { steps }
    }

    /// Builder-style append.
    pub fn then(mut self, delay: Duration, event: VoiceEvent) -> Self {
        self.steps.push(ScriptStep::new(delay, event));
        self
    }

    /// The two-exchange demo conversation.
    pub fn demo() -> Self {
        Self::default()
            .then(Duration::from_secs(2), VoiceEvent::AgentStartTalking)
            .then(Duration::from_secs(5), VoiceEvent::AgentStopTalking)
            .then(
                Duration::ZERO,
                VoiceEvent::transcript("Hello, how can I help you today?"),
            )
            .then(Duration::from_secs(5), VoiceEvent::AgentStartTalking)
            .then(Duration::from_secs(4), VoiceEvent::AgentStopTalking)
            .then(
                Duration::ZERO,
                VoiceEvent::transcript("Is there anything else I can help you with?"),
            )
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    /// Starts playback into `tx`.
    ///
    /// Playback stops early when the receiver is dropped.
    pub fn play(&self, tx: mpsc::Sender<VoiceEvent>) -> ScriptHandle {
        let steps = self.steps.clone();
        let task = tokio::spawn(async move {
            for step in steps {
                if !step.delay.is_zero() {
                    tokio::time::sleep(step.delay).await;
                }
                tracing::debug!(event = step.event.name(), "scripted event");
                if tx.send(step.event).await.is_err() {
                    tracing::debug!("script receiver dropped, stopping playback");
                    break;
                }
            }
        });
        ScriptHandle { task }
    }
}

/// Running script playback. Dropping the handle cancels playback.
#[derive(Debug)]
pub struct ScriptHandle {
    task: JoinHandle<()>,
}

impl ScriptHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for ScriptHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
