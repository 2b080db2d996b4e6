//! Server-side access to the voice provider's REST API.

use crate::config::VoiceApiConfig;
use crate::error::VoiceError;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Credentials for one browser web call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebCall {
    pub access_token: String,
    pub call_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateWebCallResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    call_id: Option<String>,
}

#[derive(Debug)]
pub struct VoiceService {
    config: VoiceApiConfig,
    http: reqwest::Client,
}

impl VoiceService {
    /// Builds the service and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError::Config` if the HTTP client cannot be constructed.
    pub fn new(config: VoiceApiConfig) -> Result<Self, VoiceError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| VoiceError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    /// True when an API key is configured; the availability check relies on this.
    pub fn is_configured(&self) -> bool {
        self.config.has_api_key()
    }

    /// Agent used when a call request does not name one.
    pub fn default_agent_id(&self) -> Option<&str> {
        self.config
            .agent_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }

    /// Asks the provider for a new web call on behalf of `user_id`.
    ///
    /// Connection failures, timeouts, and HTTP 503 are reported as
    /// `VoiceError::Unavailable` so the HTTP layer can answer 503.
    pub async fn create_web_call(
        &self,
        agent_id: &str,
        user_id: &str,
    ) -> Result<WebCall, VoiceError> {
        if !self.is_configured() {
            return Err(VoiceError::Unavailable(
                "voice API key is not configured".to_string(),
            ));
        }

        let url = format!(
            "{}/v2/create-web-call",
            self.config.api_base_url.trim_end_matches('/')
        );
        tracing::info!(agent_id, user_id, "creating web call");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&json!({
                "agent_id": agent_id,
                "metadata": { "userId": user_id },
            }))
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Err(VoiceError::Unavailable(format!(
                "voice API answered {status}"
            )));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VoiceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: CreateWebCallResponse = response
            .json()
            .await
            .map_err(|e| VoiceError::InvalidResponse(e.to_string()))?;

        let access_token = body
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| VoiceError::InvalidResponse("missing access_token".to_string()))?;

        Ok(WebCall {
            access_token,
            call_id: body.call_id.unwrap_or_default(),
        })
    }
}

fn map_request_error(err: reqwest::Error) -> VoiceError {
    if err.is_timeout() || err.is_connect() {
        VoiceError::Unavailable(err.to_string())
    } else {
        VoiceError::Api {
            status: err.status().map(|s| s.as_u16()).unwrap_or(0),
            message: err.to_string(),
        }
    }
}
