use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// API key value shipped in sample configuration; never a usable key.
pub const PLACEHOLDER_API_KEY: &str = "your_retell_api_key";

fn default_api_base_url() -> String {
    "https://api.retellai.com".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    10
}

fn default_connect_timeout_seconds() -> u64 {
    10
}

/// Credentials and endpoint of the voice provider's REST API.
#[derive(Clone, Serialize, Deserialize)]
pub struct VoiceApiConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    /// Agent used for web calls when the request does not name one.
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl Default for VoiceApiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_key: String::new(),
            agent_id: None,
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

impl fmt::Debug for VoiceApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceApiConfig")
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &"[REDACTED]")
            .field("agent_id", &self.agent_id)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

impl VoiceApiConfig {
    pub fn new(api_base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// True when an API key other than the sample placeholder is set.
    pub fn has_api_key(&self) -> bool {
        let key = self.api_key.trim();
        !key.is_empty() && key != PLACEHOLDER_API_KEY
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Where [`RealBackend`](crate::RealBackend) opens the call event channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// WebSocket URL; the access token and call id are appended as query parameters.
    pub events_url: String,
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,
}

impl RealtimeConfig {
    pub fn new(events_url: impl Into<String>) -> Self {
        Self {
            events_url: events_url.into(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}
