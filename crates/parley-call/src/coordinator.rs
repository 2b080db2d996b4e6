//! The call session state machine.
//!
//! [`CallCoordinator::run`] is the only code that mutates call state. It
//! consumes a single FIFO of inputs: user commands from
//! [`CoordinatorHandle`], and the results of backend operations it spawned,
//! each tagged with the session it belongs to. It also listens to the
//! current session's event subscription. Results for any session other than
//! the current one, or for a session that already reached a terminal state,
//! are discarded. Each transition publishes a fresh [`CallStatus`] on a
//! `watch` channel.

use crate::cue::{AudioCue, CuePlayer, CueStatus};
use crate::error::{classify, classify_message, CallError, CallErrorKind};
use crate::services::{AvailabilityCheck, CredentialSource, TranscriptLogger};
use crate::transcript::{TranscriptQueue, TranscriptWriter};
use chrono::{DateTime, Utc};
use parley_types::{
    AvailabilityStatus, CallOutcome, CallState, CallStatus, StatusTone, TranscriptRole,
};
use parley_voice::{
    BackendKind, CallHandle, CallParams, EventSubscription, VoiceBackend, VoiceEvent,
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

const SIMULATED_PREFIX: &str = "[simulated] ";
const DEMO_PREFIX: &str = "Demo mode: ";

#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfig {
    /// Fall back to the simulated backend when the service is unavailable.
    pub simulate_when_unavailable: bool,
}

/// Everything the coordinator talks to.
pub struct CallServices {
    pub availability: Arc<dyn AvailabilityCheck>,
    pub credentials: Arc<dyn CredentialSource>,
    pub logger: Arc<dyn TranscriptLogger>,
    pub backend: Arc<dyn VoiceBackend>,
    pub simulated: Arc<dyn VoiceBackend>,
    pub cue_player: Arc<dyn CuePlayer>,
}

/// User intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartCall,
    StopCall,
    Retry,
    Mute,
    Unmute,
    /// Any tap or key press; unblocks a deferred audio cue.
    UserInteraction,
    /// Ends the current call, if any, and stops the coordinator.
    Shutdown,
}

enum Input {
    Command(Command),
    Availability {
        session_id: Uuid,
        status: AvailabilityStatus,
    },
    Setup {
        session_id: Uuid,
        backend: Arc<dyn VoiceBackend>,
        result: Result<EventSubscription, CallError>,
    },
    Stopped {
        session_id: Uuid,
    },
    /// Next item from the current subscription; `None` when it closed.
    Event(Option<VoiceEvent>),
}

/// One attempt at a call, from the start request to a terminal state.
struct Session {
    id: Uuid,
    state: CallState,
    /// Created by a retry check rather than a call request.
    retry: bool,
    /// Chosen when setup begins.
    backend: Option<Arc<dyn VoiceBackend>>,
    /// Set once the backend has connected this session's call.
    call: Option<CallHandle>,
    muted: bool,
    started_at: DateTime<Utc>,
}

impl Session {
    fn new(retry: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: CallState::CheckingAvailability,
            retry,
            backend: None,
            call: None,
            muted: false,
            started_at: Utc::now(),
        }
    }

    fn simulated(&self) -> bool {
        self.backend
            .as_ref()
            .is_some_and(|backend| backend.kind() == BackendKind::Simulated)
    }
}

/// Cloneable front door to a running [`CallCoordinator`].
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Input>,
    status: watch::Receiver<CallStatus>,
}

impl CoordinatorHandle {
    /// Queues a command. Returns false once the coordinator has stopped.
    pub fn send(&self, command: Command) -> bool {
        self.tx.send(Input::Command(command)).is_ok()
    }

    pub fn start_call(&self) -> bool {
        self.send(Command::StartCall)
    }

    pub fn stop_call(&self) -> bool {
        self.send(Command::StopCall)
    }

    pub fn retry(&self) -> bool {
        self.send(Command::Retry)
    }

    pub fn mute(&self) -> bool {
        self.send(Command::Mute)
    }

    pub fn unmute(&self) -> bool {
        self.send(Command::Unmute)
    }

    pub fn user_interaction(&self) -> bool {
        self.send(Command::UserInteraction)
    }

    pub fn shutdown(&self) -> bool {
        self.send(Command::Shutdown)
    }

    /// Latest published status.
    pub fn status(&self) -> CallStatus {
        self.status.borrow().clone()
    }

    /// A receiver that observes every published status.
    pub fn subscribe(&self) -> watch::Receiver<CallStatus> {
        self.status.clone()
    }

    /// Waits until the published status satisfies `predicate`. Returns `None`
    /// if the coordinator stops first.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&CallStatus) -> bool,
    ) -> Option<CallStatus> {
        let mut rx = self.status.clone();
        let status = rx.wait_for(|status| predicate(status)).await.ok()?;
        Some((*status).clone())
    }
}

pub struct CallCoordinator {
    config: CoordinatorConfig,
    services: CallServices,
    cue: AudioCue,
    session: Option<Session>,
    subscription: Option<EventSubscription>,
    transcript: TranscriptQueue,
    writer: Option<TranscriptWriter>,
    inputs_tx: mpsc::UnboundedSender<Input>,
    inputs_rx: mpsc::UnboundedReceiver<Input>,
    status_tx: watch::Sender<CallStatus>,
}

impl CallCoordinator {
    pub fn new(services: CallServices, config: CoordinatorConfig) -> (Self, CoordinatorHandle) {
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(CallStatus::default());
        let (transcript, writer) = TranscriptQueue::new(services.logger.clone());
        let handle = CoordinatorHandle {
            tx: inputs_tx.clone(),
            status: status_rx,
        };
        let coordinator = Self {
            config,
            cue: AudioCue::new(services.cue_player.clone()),
            services,
            session: None,
            subscription: None,
            transcript,
            writer: Some(writer),
            inputs_tx,
            inputs_rx,
            status_tx,
        };
        (coordinator, handle)
    }

    fn state(&self) -> CallState {
        self.session
            .as_ref()
            .map_or(CallState::Idle, |session| session.state)
    }

    /// Runs until [`Command::Shutdown`]. Pending transcript entries are
    /// flushed before this returns the final status.
    pub async fn run(mut self) -> CallStatus {
        let writer = self.writer.take().map(|writer| tokio::spawn(writer.run()));

        loop {
            let input = tokio::select! {
                input = self.inputs_rx.recv() => match input {
                    Some(input) => input,
                    None => break,
                },
                event = next_event(&mut self.subscription) => Input::Event(event),
            };
            if matches!(input, Input::Command(Command::Shutdown)) {
                self.shutdown().await;
                break;
            }
            self.handle(input);
        }

        let final_status = self.status_tx.borrow().clone();
        // Closes the transcript queue so the writer drains and exits.
        drop(self);
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                warn!(error = %e, "transcript writer task failed");
            }
        }
        final_status
    }

    fn handle(&mut self, input: Input) {
        match input {
            Input::Command(command) => self.on_command(command),
            Input::Availability { session_id, status } => self.on_availability(session_id, status),
            Input::Setup {
                session_id,
                backend,
                result,
            } => self.on_setup(session_id, backend, result),
            Input::Stopped { session_id } => self.on_stopped(session_id),
            Input::Event(Some(event)) => self.on_event(event),
            Input::Event(None) => self.on_stream_closed(),
        }
    }

    fn is_current(&self, session_id: Uuid) -> bool {
        self.session.as_ref().is_some_and(|s| s.id == session_id)
    }

    fn on_command(&mut self, command: Command) {
        let state = self.state();
        match command {
            Command::StartCall if state.can_start() => self.begin_check(false),
            Command::StartCall => debug!(?state, "call request ignored"),
            Command::Retry if state == CallState::Unavailable => self.begin_check(true),
            Command::Retry => debug!(?state, "retry ignored"),
            Command::StopCall => self.on_stop_request(),
            Command::Mute | Command::Unmute => self.set_muted(command == Command::Mute),
            Command::UserInteraction => {
                if self.cue.retry_armed()
                    && self.cue.on_user_interaction() == CueStatus::Playing
                    && state == CallState::ActiveAgentSpeaking
                {
                    self.publish("AI is speaking...", StatusTone::Info);
                }
            }
            Command::Shutdown => {}
        }
    }

    fn begin_check(&mut self, retry: bool) {
        self.subscription = None;
        self.cue.stop();
        let session = Session::new(retry);
        let session_id = session.id;
        info!(%session_id, retry, "checking voice service availability");
        self.session = Some(session);
        self.publish("Checking service availability...", StatusTone::Info);

        let availability = self.services.availability.clone();
        let tx = self.inputs_tx.clone();
        tokio::spawn(async move {
            let status = availability.check().await;
            let _ = tx.send(Input::Availability { session_id, status });
        });
    }

    fn on_availability(&mut self, session_id: Uuid, status: AvailabilityStatus) {
        if !self.is_current(session_id) || self.state() != CallState::CheckingAvailability {
            debug!(%session_id, "stale availability result discarded");
            return;
        }
        let retry = self.session.as_ref().is_some_and(|s| s.retry);

        if status.available {
            if retry {
                self.transition(CallState::Idle);
                self.publish("Service is now available", StatusTone::Success);
            } else {
                self.begin_setup(false);
            }
            return;
        }

        let reason = status.reason.unwrap_or_default();
        warn!(%session_id, %reason, "voice service unavailable");
        if retry {
            self.transition(CallState::Unavailable);
            self.publish(
                "The voice service is still unavailable. Please try again later.",
                StatusTone::Error,
            );
        } else if self.config.simulate_when_unavailable {
            self.begin_setup(true);
        } else {
            self.transition(CallState::Unavailable);
            self.publish("Voice service unavailable", StatusTone::Error);
        }
    }

    fn begin_setup(&mut self, simulated: bool) {
        let backend = if simulated {
            self.services.simulated.clone()
        } else {
            self.services.backend.clone()
        };
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.backend = Some(backend.clone());
        let session_id = session.id;
        self.transition(CallState::Starting);
        self.publish("Starting call...", StatusTone::Info);

        let tx = self.inputs_tx.clone();
        let credentials = self.services.credentials.clone();
        tokio::spawn(async move {
            let result = set_up_call(session_id, credentials, backend.clone()).await;
            let _ = tx.send(Input::Setup {
                session_id,
                backend,
                result,
            });
        });
    }

    fn on_setup(
        &mut self,
        session_id: Uuid,
        backend: Arc<dyn VoiceBackend>,
        result: Result<EventSubscription, CallError>,
    ) {
        if !self.is_current(session_id) || self.state() != CallState::Starting {
            match result {
                Ok(subscription) => {
                    let call = subscription.handle();
                    info!(%session_id, %call, "releasing call that finished setup after it was cancelled");
                    drop(subscription);
                    tokio::spawn(async move { backend.stop_call(call).await });
                }
                Err(e) => debug!(%session_id, error = %e, "stale call setup failure discarded"),
            }
            return;
        }

        match result {
            Ok(subscription) => {
                if let Some(session) = self.session.as_mut() {
                    session.call = Some(subscription.handle());
                }
                self.subscription = Some(subscription);
                self.transition(CallState::ActiveListening);
                self.log_system("Call started");
                self.publish("Call active", StatusTone::Success);
            }
            Err(e) => {
                let kind = classify(&e);
                warn!(%session_id, error = %e, ?kind, "call setup failed");
                if kind == CallErrorKind::BackendUnavailable && !self.simulated() {
                    self.transition(CallState::Unavailable);
                    self.publish(kind.user_message(), StatusTone::Error);
                } else {
                    self.finish(
                        CallOutcome::Error,
                        &format!("Call failed: {e}"),
                        kind.user_message(),
                    );
                }
            }
        }
    }

    fn on_stop_request(&mut self) {
        let state = self.state();
        match state {
            CallState::ActiveListening | CallState::ActiveAgentSpeaking => {
                self.cue.stop();
                self.transition(CallState::Ending);
                self.publish("Ending call...", StatusTone::Info);
                let Some(session_id) = self.session.as_ref().map(|s| s.id) else {
                    return;
                };
                let connected = self.connected_call();
                let tx = self.inputs_tx.clone();
                tokio::spawn(async move {
                    if let Some((backend, call)) = connected {
                        backend.stop_call(call).await;
                    }
                    let _ = tx.send(Input::Stopped { session_id });
                });
            }
            CallState::CheckingAvailability if self.session.as_ref().is_some_and(|s| s.retry) => {
                debug!("stop ignored during retry check");
            }
            CallState::CheckingAvailability | CallState::Starting => {
                self.finish(CallOutcome::Success, "Call cancelled", "Call cancelled");
            }
            _ => debug!(?state, "stop ignored"),
        }
    }

    fn on_stopped(&mut self, session_id: Uuid) {
        if self.is_current(session_id) && self.state() == CallState::Ending {
            self.finish(CallOutcome::Success, "Call ended", "Call ended");
        }
    }

    fn on_event(&mut self, event: VoiceEvent) {
        let state = self.state();
        debug!(event = event.name(), ?state, "voice event");
        match event {
            VoiceEvent::CallStarted => {}
            VoiceEvent::AgentStartTalking if state == CallState::ActiveListening => {
                self.transition(CallState::ActiveAgentSpeaking);
                let message = match self.cue.start() {
                    CueStatus::Deferred => "AI is speaking... (tap to enable sound)",
                    _ => "AI is speaking...",
                };
                self.publish(message, StatusTone::Info);
            }
            VoiceEvent::AgentStopTalking if state == CallState::ActiveAgentSpeaking => {
                self.cue.stop();
                self.transition(CallState::ActiveListening);
                self.publish("Listening...", StatusTone::Info);
            }
            VoiceEvent::AgentStartTalking | VoiceEvent::AgentStopTalking => {}
            VoiceEvent::TranscriptUpdate { transcript } => {
                if !transcript.trim().is_empty() {
                    self.log(TranscriptRole::Transcript, &transcript);
                }
            }
            VoiceEvent::CallEnded => {
                if state.is_active() || state == CallState::Ending {
                    self.finish(CallOutcome::Success, "Call ended", "Call ended");
                }
            }
            VoiceEvent::Error { message } => self.fail(&message),
        }
    }

    fn on_stream_closed(&mut self) {
        self.subscription = None;
        match self.state() {
            CallState::Ending => self.finish(CallOutcome::Success, "Call ended", "Call ended"),
            state if state.is_active() => self.fail("voice connection closed unexpectedly"),
            _ => {}
        }
    }

    /// Ends a connected call after a backend-reported failure.
    fn fail(&mut self, message: &str) {
        let state = self.state();
        if !(state.is_active() || state == CallState::Ending) {
            return;
        }
        let kind = classify_message(message);
        warn!(%message, ?kind, "call ended with error");
        if let Some((backend, call)) = self.connected_call() {
            tokio::spawn(async move { backend.stop_call(call).await });
        }
        self.finish(
            CallOutcome::Error,
            &format!("Call ended with error: {message}"),
            kind.user_message(),
        );
    }

    /// Moves the session to `Ended(outcome)` exactly once.
    fn finish(&mut self, outcome: CallOutcome, entry: &str, status: &str) {
        if self.state().is_ended() {
            return;
        }
        self.cue.stop();
        self.subscription = None;
        self.transition(CallState::Ended(outcome));
        if let Some(session) = &self.session {
            let elapsed = Utc::now() - session.started_at;
            info!(
                session_id = %session.id,
                ?outcome,
                duration_ms = elapsed.num_milliseconds(),
                "call finished"
            );
        }
        self.log_system(entry);
        let tone = match outcome {
            CallOutcome::Success => StatusTone::Info,
            CallOutcome::Error => StatusTone::Error,
        };
        self.publish(status, tone);
    }

    fn set_muted(&mut self, muted: bool) {
        if !self.state().is_active() {
            return;
        }
        let Some((backend, call)) = self.connected_call() else {
            return;
        };
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.muted == muted {
            return;
        }
        session.muted = muted;
        if muted {
            backend.mute(call);
        } else {
            backend.unmute(call);
        }
        let message = if muted { "Microphone muted" } else { "Call active" };
        self.publish(message, StatusTone::Info);
    }

    /// Hangs up inline; the process is about to exit.
    async fn shutdown(&mut self) {
        let state = self.state();
        if state.is_active() || state == CallState::Ending {
            if let Some((backend, call)) = self.connected_call() {
                backend.stop_call(call).await;
            }
            self.finish(CallOutcome::Success, "Call ended", "Call ended");
        } else if matches!(state, CallState::Starting | CallState::CheckingAvailability)
            && !self.session.as_ref().is_some_and(|s| s.retry)
        {
            self.finish(CallOutcome::Success, "Call cancelled", "Call cancelled");
        }
        self.cue.stop();
        info!("call coordinator stopped");
    }

    fn transition(&mut self, to: CallState) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let from = session.state;
        session.state = to;
        if matches!(to, CallState::Idle | CallState::Unavailable | CallState::Ended(_)) {
            self.subscription = None;
        }
        debug!(session_id = %session.id, ?from, ?to, "call state changed");
    }

    /// The current session's backend and call, once connected.
    fn connected_call(&self) -> Option<(Arc<dyn VoiceBackend>, CallHandle)> {
        let session = self.session.as_ref()?;
        Some((session.backend.clone()?, session.call?))
    }

    fn simulated(&self) -> bool {
        self.session.as_ref().is_some_and(Session::simulated)
    }

    fn log_system(&self, message: &str) {
        self.log(TranscriptRole::System, message);
    }

    fn log(&self, role: TranscriptRole, message: &str) {
        if self.simulated() {
            self.transcript.push(role, format!("{SIMULATED_PREFIX}{message}"));
        } else {
            self.transcript.push(role, message);
        }
    }

    fn publish(&self, message: &str, tone: StatusTone) {
        let state = self.state();
        let simulated = self.simulated();
        let message = if simulated {
            format!("{DEMO_PREFIX}{message}")
        } else {
            message.to_string()
        };
        let status = CallStatus {
            state,
            message,
            tone,
            session_id: self.session.as_ref().map(|s| s.id),
            simulated,
            muted: self.session.as_ref().is_some_and(|s| s.muted),
            retry_available: state == CallState::Unavailable,
        };
        self.status_tx.send_replace(status);
    }
}

async fn set_up_call(
    session_id: Uuid,
    credentials: Arc<dyn CredentialSource>,
    backend: Arc<dyn VoiceBackend>,
) -> Result<EventSubscription, CallError> {
    let params = if backend.kind() == BackendKind::Simulated {
        CallParams {
            access_token: "simulated".to_string(),
            call_id: format!("sim-{session_id}"),
        }
    } else {
        credentials.credentials().await?
    };
    Ok(backend.start_call(&params).await?)
}

async fn next_event(subscription: &mut Option<EventSubscription>) -> Option<VoiceEvent> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}
