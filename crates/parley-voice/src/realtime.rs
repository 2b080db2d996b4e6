//! Event channel to the voice provider.
//!
//! Audio flows through the provider's own media transport. What Parley
//! consumes is the signalling side: a WebSocket on which the provider pushes
//! lifecycle and transcript frames, and on which the client sends
//! mute/unmute/stop commands.

use crate::backend::{BackendKind, CallHandle, CallParams, EventSubscription, VoiceBackend};
use crate::config::RealtimeConfig;
use crate::error::VoiceError;
use crate::event::VoiceEvent;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};

/// How long `stop_call` waits for the connection task to wind down.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Commands sent to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum Control {
    Mute,
    Unmute,
    Stop,
}

struct Connection {
    call_id: String,
    control: mpsc::UnboundedSender<Control>,
    task: JoinHandle<()>,
}

/// [`VoiceBackend`] backed by the provider's WebSocket event channel.
///
/// Each started call owns its own connection, keyed by its [`CallHandle`].
pub struct RealBackend {
    config: RealtimeConfig,
    connections: Mutex<HashMap<CallHandle, Connection>>,
}

impl RealBackend {
    pub fn new(config: RealtimeConfig) -> Self {
        Self {
            config,
            connections: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CallHandle, Connection>> {
        self.connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn send_control(&self, call: CallHandle, control: Control) {
        match self.lock().get(&call) {
            Some(conn) => {
                if conn.control.send(control).is_err() {
                    debug!(call_id = %conn.call_id, ?control, "connection already closed");
                }
            }
            None => debug!(%call, ?control, "no such call"),
        }
    }

    fn call_url(&self, params: &CallParams) -> Result<reqwest::Url, VoiceError> {
        let mut url = reqwest::Url::parse(&self.config.events_url).map_err(|e| {
            VoiceError::Config(format!("invalid events_url '{}': {e}", self.config.events_url))
        })?;
        url.query_pairs_mut()
            .append_pair("access_token", &params.access_token)
            .append_pair("call_id", &params.call_id);
        Ok(url)
    }
}

/// Maps a handshake failure onto the error kinds the coordinator classifies.
fn map_connect_error(err: tungstenite::Error) -> VoiceError {
    match err {
        tungstenite::Error::Io(e) => VoiceError::Connect(e.to_string()),
        tungstenite::Error::Http(response) => {
            let status = response.status();
            if status.as_u16() == 503 {
                VoiceError::Unavailable(format!("event channel answered {status}"))
            } else {
                VoiceError::Protocol(format!("event channel handshake rejected: {status}"))
            }
        }
        other => VoiceError::Protocol(other.to_string()),
    }
}

#[async_trait]
impl VoiceBackend for RealBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Real
    }

    async fn start_call(&self, params: &CallParams) -> Result<EventSubscription, VoiceError> {
        let url = self.call_url(params)?;
        let timeout = self.config.connect_timeout();

        let (socket, _response) =
            tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url.as_str()))
                .await
                .map_err(|_| VoiceError::Timeout(timeout))?
                .map_err(map_connect_error)?;

        info!(call_id = %params.call_id, "voice event channel connected");

        let (events_tx, subscription) = EventSubscription::channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(pump(
            params.call_id.clone(),
            socket,
            control_rx,
            events_tx,
        ));

        {
            let mut connections = self.lock();
            // Calls the provider already hung up are never stopped explicitly.
            connections.retain(|_, conn| !conn.task.is_finished());
            connections.insert(
                subscription.handle(),
                Connection {
                    call_id: params.call_id.clone(),
                    control: control_tx,
                    task,
                },
            );
        }

        Ok(subscription)
    }

    async fn stop_call(&self, call: CallHandle) {
        let Some(conn) = self.lock().remove(&call) else {
            return;
        };
        let _ = conn.control.send(Control::Stop);
        let mut task = conn.task;
        if tokio::time::timeout(STOP_TIMEOUT, &mut task).await.is_err() {
            warn!(call_id = %conn.call_id, "event channel did not close in time, aborting");
            task.abort();
        }
    }

    fn mute(&self, call: CallHandle) {
        self.send_control(call, Control::Mute);
    }

    fn unmute(&self, call: CallHandle) {
        self.send_control(call, Control::Unmute);
    }
}

/// Moves frames between the socket and the subscription until either side ends.
///
/// Exits without emitting `call_ended` when the provider drops the socket
/// unannounced, so the subscriber sees the stream close instead.
async fn pump<S>(
    call_id: String,
    socket: S,
    mut control_rx: mpsc::UnboundedReceiver<Control>,
    events_tx: mpsc::Sender<VoiceEvent>,
) where
    S: futures_util::Stream<Item = Result<Message, tungstenite::Error>>
        + futures_util::Sink<Message, Error = tungstenite::Error>
        + Unpin,
{
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            control = control_rx.recv() => {
                let control = control.unwrap_or(Control::Stop);
                let frame = match serde_json::to_string(&control) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(call_id = %call_id, error = %e, "failed to encode control frame");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::text(frame)).await {
                    warn!(call_id = %call_id, error = %e, "failed to send control frame");
                }
                if control == Control::Stop {
                    let _ = sink.send(Message::Close(None)).await;
                    let _ = events_tx.send(VoiceEvent::CallEnded).await;
                    debug!(call_id = %call_id, "event channel closed by client");
                    return;
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let event = match serde_json::from_str::<VoiceEvent>(text.as_str()) {
                            Ok(event) => event,
                            Err(e) => {
                                warn!(call_id = %call_id, error = %e, "ignoring malformed event frame");
                                continue;
                            }
                        };
                        let ended = event == VoiceEvent::CallEnded;
                        if events_tx.send(event).await.is_err() {
                            debug!(call_id = %call_id, "subscription dropped, closing event channel");
                            let _ = sink.send(Message::Close(None)).await;
                            return;
                        }
                        if ended {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(call_id = %call_id, "event channel closed by provider");
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(call_id = %call_id, error = %e, "event channel read failed");
                        let _ = events_tx.send(VoiceEvent::error(format!("connection error: {e}"))).await;
                        return;
                    }
                }
            }
        }
    }
}
