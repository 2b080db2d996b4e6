//! `parley-call`: place a voice call from the terminal.
//!
//! Commands on stdin: `m` mute, `u` unmute, `r` retry, `s` start again after
//! a successful retry, `q` hang up, `f <path>` upload a file. Any
//! input also counts as a user interaction for the audio cue. Ctrl+C hangs
//! up; the process exits once the call reaches a terminal state.

use parley_call::config::{self, CallClientConfig};
use parley_call::{
    CallCoordinator, CallServices, Command, CoordinatorConfig,
    CoordinatorHandle, LogCuePlayer, ServiceClient,
};
use parley_types::{CallState, CallStatus};
use parley_voice::{RealBackend, RealtimeConfig, SimulatedBackend};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("PARLEY_CALL_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

fn init_tracing(config: &CallClientConfig) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn command_for(line: &str) -> Command {
    match line.trim() {
        "m" | "mute" => Command::Mute,
        "u" | "unmute" => Command::Unmute,
        "r" | "retry" => Command::Retry,
        "s" | "start" => Command::StartCall,
        "q" | "quit" | "stop" => Command::StopCall,
        _ => Command::UserInteraction,
    }
}

/// Path named by an `f <path>` / `file <path>` line.
fn upload_path(line: &str) -> Option<PathBuf> {
    let (verb, rest) = line.trim().split_once(char::is_whitespace)?;
    let path = rest.trim();
    (matches!(verb, "f" | "file") && !path.is_empty()).then(|| PathBuf::from(path))
}

/// Uploads `path`, then lists the user's uploads.
async fn share(client: Arc<ServiceClient>, path: PathBuf) {
    let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
        tracing::warn!(path = %path.display(), "not a file path");
        return;
    };
    let content = match tokio::fs::read(&path).await {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read file");
            return;
        }
    };
    match client.share_file(filename, content).await {
        Ok(receipt) => tracing::info!("File uploaded: {}", receipt.filename),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to upload file");
            return;
        }
    }
    match client.uploads().await {
        Ok(uploads) => {
            for upload in &uploads {
                tracing::info!(uploaded_at = %upload.timestamp, "  {}", upload.filename);
            }
        }
        Err(e) => tracing::warn!(error = %e, "failed to refresh uploads"),
    }
}

fn report(status: &CallStatus) {
    tracing::info!(
        state = ?status.state,
        simulated = status.simulated,
        muted = status.muted,
        "{}",
        status.message
    );
    if status.retry_available {
        tracing::info!("type `r` and press enter to check again");
    }
}

async fn drive(handle: CoordinatorHandle, client: Arc<ServiceClient>) {
    let mut status_rx = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    handle.start_call();
    loop {
        tokio::select! {
            changed = status_rx.changed() => {
                if changed.is_err() {
                    return;
                }
                let status = status_rx.borrow_and_update().clone();
                report(&status);
                if status.state.is_ended() {
                    return;
                }
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    handle.send(Command::UserInteraction);
                    if let Some(path) = upload_path(&line) {
                        tokio::spawn(share(client.clone(), path));
                    } else {
                        let command = command_for(&line);
                        if command != Command::UserInteraction {
                            handle.send(command);
                        }
                    }
                }
                Ok(None) | Err(_) => stdin_open = false,
            },
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "failed to listen for Ctrl+C");
                    return;
                }
                match handle.status().state {
                    state if state.is_in_progress() => {
                        tracing::info!("hanging up");
                        handle.stop_call();
                    }
                    CallState::Unavailable | CallState::Idle => return,
                    _ => {}
                }
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("parley-call.toml"));

    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration for parley-call");
    init_tracing(&config);

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved client configuration path"
    );

    let mut client = ServiceClient::new(&config.service.url)
        .expect("invalid service.url in configuration")
        .with_agent(config.service.agent_id.clone())
        .with_availability_timeout(config.service.availability_timeout());
    if let Some(user_id) = config.service.user_id.clone() {
        client = client.with_user(user_id);
    }
    match client.identify().await {
        Ok(user_id) => tracing::info!(%user_id, "using identity"),
        Err(e) => tracing::warn!(
            error = %e,
            "could not identify with the service; transcripts will not be saved"
        ),
    }
    let client = Arc::new(client);

    let realtime = config.realtime.clone().unwrap_or_else(|| {
        tracing::warn!("realtime.events_url is not configured; only simulated calls can connect");
        RealtimeConfig::new("")
    });

    let services = CallServices {
        availability: client.clone(),
        credentials: client.clone(),
        logger: client.clone(),
        backend: Arc::new(RealBackend::new(realtime)),
        simulated: Arc::new(SimulatedBackend::demo()),
        cue_player: Arc::new(LogCuePlayer),
    };
    let (coordinator, handle) = CallCoordinator::new(
        services,
        CoordinatorConfig {
            simulate_when_unavailable: config.call.simulate_when_unavailable,
        },
    );
    let coordinator = tokio::spawn(coordinator.run());

    drive(handle.clone(), client.clone()).await;

    handle.shutdown();
    match coordinator.await {
        Ok(status) => tracing::info!(state = ?status.state, "parley-call finished"),
        Err(e) => tracing::error!(error = %e, "call coordinator panicked"),
    }

    if let Ok(history) = client.history().await {
        tracing::info!(entries = history.len(), "conversation saved");
    }
}
