//! Configuration for the `parley-call` terminal client.

use parley_voice::RealtimeConfig;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallClientConfig {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub call: CallConfig,

    /// Provider event channel. Without it only simulated calls can connect.
    #[serde(default)]
    pub realtime: Option<RealtimeConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the Parley HTTP service lives and who we are on it.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_url")]
    pub url: String,

    /// Resume this identity instead of requesting a new one.
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub agent_id: Option<String>,

    #[serde(default = "default_availability_timeout_seconds")]
    pub availability_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallConfig {
    /// Play the demo conversation when the voice service is unavailable.
    #[serde(default = "default_simulate")]
    pub simulate_when_unavailable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "parley_call=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

fn default_service_url() -> String {
    "http://127.0.0.1:12000".to_string()
}

fn default_availability_timeout_seconds() -> u64 {
    5
}

fn default_simulate() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: default_service_url(),
            user_id: None,
            agent_id: None,
            availability_timeout_seconds: default_availability_timeout_seconds(),
        }
    }
}

impl ServiceConfig {
    pub fn availability_timeout(&self) -> Duration {
        Duration::from_secs(self.availability_timeout_seconds)
    }
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            simulate_when_unavailable: default_simulate(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads the client configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `PARLEY_SERVICE_URL` overrides `service.url`
/// - `PARLEY_USER_ID` overrides `service.user_id`
/// - `PARLEY_EVENTS_URL` overrides `realtime.events_url`
/// - `PARLEY_SIMULATE` overrides `call.simulate_when_unavailable`
/// - `PARLEY_LOG_LEVEL` overrides `logging.level`
/// - `PARLEY_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<CallClientConfig, ConfigError> {
    let config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                CallClientConfig::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => CallClientConfig::default(),
    };
    Ok(apply_env_overrides(config, |key| std::env::var(key).ok()))
}

fn apply_env_overrides(
    mut config: CallClientConfig,
    var: impl Fn(&str) -> Option<String>,
) -> CallClientConfig {
    if let Some(url) = var("PARLEY_SERVICE_URL") {
        config.service.url = url;
    }
    if let Some(user_id) = var("PARLEY_USER_ID").filter(|id| !id.trim().is_empty()) {
        config.service.user_id = Some(user_id);
    }
    if let Some(events_url) = var("PARLEY_EVENTS_URL") {
        match config.realtime.as_mut() {
            Some(realtime) => realtime.events_url = events_url,
            None => config.realtime = Some(RealtimeConfig::new(events_url)),
        }
    }
    if let Some(simulate) = var("PARLEY_SIMULATE") {
        config.call.simulate_when_unavailable = simulate == "true" || simulate == "1";
    }
    if let Some(level) = var("PARLEY_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("PARLEY_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    config
}
