#![allow(dead_code)]

use async_trait::async_trait;
use parley_call::{
    AvailabilityCheck, CallCoordinator, CallServices, ClientError, CoordinatorConfig,
    CoordinatorHandle, CredentialSource, CuePlayer, PlaybackError, TranscriptLogger,
};
use parley_types::{AvailabilityStatus, CallState, CallStatus, TranscriptRole};
use parley_voice::{
    BackendKind, CallHandle, CallParams, EventSubscription, SimulatedBackend, VoiceBackend,
    VoiceError, VoiceEvent,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

pub const WAIT: Duration = Duration::from_secs(60);

/// Answers availability checks from a queue; the last answer repeats.
pub struct FakeAvailability {
    answers: Mutex<VecDeque<AvailabilityStatus>>,
    gate: Mutex<Option<Arc<Notify>>>,
    pub checks: AtomicUsize,
}

impl FakeAvailability {
    pub fn new(answers: Vec<AvailabilityStatus>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.into()),
            gate: Mutex::new(None),
            checks: AtomicUsize::new(0),
        })
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    /// The next check waits until `gate` is notified.
    pub fn hold(&self, gate: Arc<Notify>) {
        *self.gate.lock().unwrap() = Some(gate);
    }
}

#[async_trait]
impl AvailabilityCheck for FakeAvailability {
    async fn check(&self) -> AvailabilityStatus {
        self.checks.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let mut answers = self.answers.lock().unwrap();
        if answers.len() > 1 {
            answers.pop_front().unwrap()
        } else {
            answers
                .front()
                .cloned()
                .unwrap_or_else(AvailabilityStatus::available)
        }
    }
}

#[derive(Default)]
pub struct FakeCredentials {
    pub fail_unavailable: bool,
    pub calls: AtomicUsize,
}

impl FakeCredentials {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSource for FakeCredentials {
    async fn credentials(&self) -> Result<CallParams, ClientError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_unavailable {
            return Err(ClientError::Unavailable {
                details: "voice API key is not configured".into(),
            });
        }
        Ok(CallParams {
            access_token: format!("tok-{n}"),
            call_id: format!("call-{n}"),
        })
    }
}

/// Scriptable stand-in for the real backend.
#[derive(Default)]
pub struct FakeBackend {
    results: Mutex<VecDeque<Result<(), VoiceError>>>,
    gate: Mutex<Option<Arc<Notify>>>,
    live: Mutex<Vec<(CallHandle, mpsc::Sender<VoiceEvent>)>>,
    stopped_calls: Mutex<Vec<CallHandle>>,
    muted_calls: Mutex<Vec<CallHandle>>,
    starts: AtomicUsize,
    unmutes: AtomicUsize,
    stopped: Notify,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next `start_call` fails with `err`.
    pub fn failing(err: VoiceError) -> Self {
        let backend = Self::default();
        backend.results.lock().unwrap().push_back(Err(err));
        backend
    }

    /// The first `start_call` blocks until `gate` is notified; later ones
    /// connect at once.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Mutex::new(Some(gate)),
            ..Self::default()
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stopped_calls().len()
    }

    pub fn mutes(&self) -> usize {
        self.muted_calls().len()
    }

    pub fn unmutes(&self) -> usize {
        self.unmutes.load(Ordering::SeqCst)
    }

    /// Calls connected and not yet stopped, oldest first.
    pub fn live_calls(&self) -> Vec<CallHandle> {
        self.live.lock().unwrap().iter().map(|(call, _)| *call).collect()
    }

    pub fn stopped_calls(&self) -> Vec<CallHandle> {
        self.stopped_calls.lock().unwrap().clone()
    }

    pub fn muted_calls(&self) -> Vec<CallHandle> {
        self.muted_calls.lock().unwrap().clone()
    }

    /// Delivers an event on the newest live call's stream.
    pub async fn push(&self, event: VoiceEvent) {
        let tx = self
            .live
            .lock()
            .unwrap()
            .last()
            .map(|(_, tx)| tx.clone())
            .expect("no connected call");
        tx.send(event).await.expect("subscription dropped");
    }

    /// Drops the newest call's stream without a `call_ended` event.
    pub fn drop_connection(&self) {
        self.live.lock().unwrap().pop();
    }

    pub async fn wait_stopped(&self) {
        tokio::time::timeout(WAIT, self.stopped.notified())
            .await
            .expect("backend was never stopped");
    }

    pub async fn wait_starts(&self, n: usize) {
        tokio::time::timeout(WAIT, async {
            while self.starts() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("backend was never asked to start");
    }
}

#[async_trait]
impl VoiceBackend for FakeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Real
    }

    async fn start_call(&self, _params: &CallParams) -> Result<EventSubscription, VoiceError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let next = self.results.lock().unwrap().pop_front().unwrap_or(Ok(()));
        next?;
        let (tx, subscription) = EventSubscription::channel();
        self.live.lock().unwrap().push((subscription.handle(), tx));
        Ok(subscription)
    }

    async fn stop_call(&self, call: CallHandle) {
        self.stopped_calls.lock().unwrap().push(call);
        let tx = {
            let mut live = self.live.lock().unwrap();
            let index = live.iter().position(|(handle, _)| *handle == call);
            index.map(|index| live.remove(index).1)
        };
        if let Some(tx) = tx {
            let _ = tx.try_send(VoiceEvent::CallEnded);
        }
        self.stopped.notify_one();
    }

    fn mute(&self, call: CallHandle) {
        self.muted_calls.lock().unwrap().push(call);
    }

    fn unmute(&self, _call: CallHandle) {
        self.unmutes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<(TranscriptRole, String)>>,
}

impl RecordingLogger {
    pub fn entries(&self) -> Vec<(TranscriptRole, String)> {
        self.entries.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|(_, m)| m).collect()
    }
}

#[async_trait]
impl TranscriptLogger for RecordingLogger {
    async fn append(&self, role: TranscriptRole, message: &str) -> Result<(), ClientError> {
        self.entries
            .lock()
            .unwrap()
            .push((role, message.to_string()));
        Ok(())
    }
}

/// Records cue operations; the first `blocked` plays are refused.
#[derive(Default)]
pub struct RecordingPlayer {
    pub blocked: AtomicUsize,
    ops: Mutex<Vec<&'static str>>,
}

impl RecordingPlayer {
    pub fn ops(&self) -> Vec<&'static str> {
        self.ops.lock().unwrap().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.ops().iter().filter(|o| **o == op).count()
    }
}

impl CuePlayer for RecordingPlayer {
    fn play(&self) -> Result<(), PlaybackError> {
        self.ops.lock().unwrap().push("play");
        let blocked = self.blocked.load(Ordering::SeqCst);
        if blocked > 0 {
            self.blocked.store(blocked - 1, Ordering::SeqCst);
            return Err(PlaybackError::Blocked("user gesture required".into()));
        }
        Ok(())
    }

    fn halt(&self) {
        self.ops.lock().unwrap().push("halt");
    }
}

pub struct Harness {
    pub handle: CoordinatorHandle,
    pub availability: Arc<FakeAvailability>,
    pub credentials: Arc<FakeCredentials>,
    pub backend: Arc<FakeBackend>,
    pub logger: Arc<RecordingLogger>,
    pub player: Arc<RecordingPlayer>,
    task: JoinHandle<CallStatus>,
}

pub struct HarnessBuilder {
    availability: Vec<AvailabilityStatus>,
    credentials: FakeCredentials,
    backend: FakeBackend,
    player: RecordingPlayer,
    simulate: bool,
}

impl HarnessBuilder {
    pub fn availability(mut self, answers: Vec<AvailabilityStatus>) -> Self {
        self.availability = answers;
        self
    }

    pub fn backend(mut self, backend: FakeBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn credentials(mut self, credentials: FakeCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn blocked_cue(self, times: usize) -> Self {
        self.player.blocked.store(times, Ordering::SeqCst);
        self
    }

    pub fn simulate(mut self) -> Self {
        self.simulate = true;
        self
    }

    pub fn spawn(self) -> Harness {
        let availability = FakeAvailability::new(self.availability);
        let credentials = Arc::new(self.credentials);
        let backend = Arc::new(self.backend);
        let logger = Arc::new(RecordingLogger::default());
        let player = Arc::new(self.player);

        let services = CallServices {
            availability: availability.clone(),
            credentials: credentials.clone(),
            logger: logger.clone(),
            backend: backend.clone(),
            simulated: Arc::new(SimulatedBackend::demo()),
            cue_player: player.clone(),
        };
        let (coordinator, handle) = CallCoordinator::new(
            services,
            CoordinatorConfig {
                simulate_when_unavailable: self.simulate,
            },
        );
        let task = tokio::spawn(coordinator.run());

        Harness {
            handle,
            availability,
            credentials,
            backend,
            logger,
            player,
            task,
        }
    }
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            availability: vec![AvailabilityStatus::available()],
            credentials: FakeCredentials::default(),
            backend: FakeBackend::new(),
            player: RecordingPlayer::default(),
            simulate: false,
        }
    }

    pub async fn wait_state(&self, state: CallState) -> CallStatus {
        tokio::time::timeout(WAIT, self.handle.wait_for(|s| s.state == state))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {state:?}"))
            .expect("coordinator stopped")
    }

    /// Brings a call up to `ActiveListening`.
    pub async fn connect(&self) -> CallStatus {
        self.handle.start_call();
        self.wait_state(CallState::ActiveListening).await
    }

    /// Stops the coordinator and flushes the transcript.
    pub async fn finish(self) -> (CallStatus, Arc<RecordingLogger>, Arc<RecordingPlayer>) {
        self.handle.shutdown();
        let status = tokio::time::timeout(WAIT, self.task)
            .await
            .expect("coordinator did not stop")
            .expect("coordinator panicked");
        (status, self.logger, self.player)
    }
}

pub fn system(message: &str) -> (TranscriptRole, String) {
    (TranscriptRole::System, message.to_string())
}

pub fn transcript(message: &str) -> (TranscriptRole, String) {
    (TranscriptRole::Transcript, message.to_string())
}
