//! HTTP client for the Parley service.

use crate::error::{CallErrorKind, ClientError};
use crate::services::{AvailabilityCheck, CredentialSource, TranscriptLogger};
use async_trait::async_trait;
use parley_types::{AvailabilityStatus, TranscriptEntry, TranscriptRole, UploadSummary};
use parley_voice::CallParams;
use reqwest::header::COOKIE;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound on a single availability check.
pub const DEFAULT_AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserResponse {
    user_id: String,
}

#[derive(Deserialize)]
struct ServiceCheckResponse {
    available: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    details: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CallRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    agent_id: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallResponse {
    access_token: String,
    #[serde(default)]
    call_id: String,
}

#[derive(Serialize)]
struct NewEntry<'a> {
    message: &'a str,
    role: TranscriptRole,
}

/// Reply to a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadReceipt {
    pub message: String,
    pub filename: String,
}

/// Talks to the Parley HTTP service on behalf of one user.
///
/// The identity lives in the `userId` cookie. [`ServiceClient::identify`]
/// obtains one; [`ServiceClient::with_user`] resumes a known identity.
pub struct ServiceClient {
    base_url: String,
    http: reqwest::Client,
    availability_timeout: Duration,
    agent_id: Option<String>,
    user_id: Mutex<Option<String>>,
}

impl ServiceClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        reqwest::Url::parse(base_url).map_err(|e| ClientError::BaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            availability_timeout: DEFAULT_AVAILABILITY_TIMEOUT,
            agent_id: None,
            user_id: Mutex::new(None),
        })
    }

    pub fn with_user(self, user_id: impl Into<String>) -> Self {
        *self.identity() = Some(user_id.into());
        self
    }

    /// Agent requested when starting calls. Without one the server default applies.
    pub fn with_agent(mut self, agent_id: Option<String>) -> Self {
        self.agent_id = agent_id.filter(|id| !id.trim().is_empty());
        self
    }

    pub fn with_availability_timeout(mut self, timeout: Duration) -> Self {
        self.availability_timeout = timeout;
        self
    }

    pub fn user_id(&self) -> Option<String> {
        self.identity().clone()
    }

    fn identity(&self) -> MutexGuard<'_, Option<String>> {
        self.user_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authed(&self, builder: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let user_id = self.user_id().ok_or(ClientError::Unidentified)?;
        Ok(builder.header(COOKIE, format!("userId={user_id}")))
    }

    /// Gets (or confirms) this client's user id from the service.
    pub async fn identify(&self) -> Result<String, ClientError> {
        let mut request = self.http.get(self.url("/api/user"));
        if let Some(user_id) = self.user_id() {
            request = request.header(COOKIE, format!("userId={user_id}"));
        }
        let response = expect_status(request.send().await?, StatusCode::OK).await?;
        let body: UserResponse = response.json().await?;
        info!(user_id = %body.user_id, "identified with service");
        *self.identity() = Some(body.user_id.clone());
        Ok(body.user_id)
    }

    /// Full transcript for this user, oldest first.
    pub async fn history(&self) -> Result<Vec<TranscriptEntry>, ClientError> {
        let request = self.authed(self.http.get(self.url("/api/conversations")))?;
        let response = expect_status(request.send().await?, StatusCode::OK).await?;
        Ok(response.json().await?)
    }

    /// Uploaded files for this user, newest first.
    pub async fn uploads(&self) -> Result<Vec<UploadSummary>, ClientError> {
        let request = self.authed(self.http.get(self.url("/api/uploads")))?;
        let response = expect_status(request.send().await?, StatusCode::OK).await?;
        Ok(response.json().await?)
    }

    pub async fn upload(
        &self,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<UploadReceipt, ClientError> {
        let part = reqwest::multipart::Part::bytes(content).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let request = self.authed(self.http.post(self.url("/api/upload")))?;
        let response = expect_status(request.multipart(form).send().await?, StatusCode::CREATED).await?;
        Ok(response.json().await?)
    }

    /// Uploads a file and records `File uploaded: <name>` in the transcript
    /// as a user entry, using the name the service stored.
    ///
    /// The transcript entry is best-effort: a failure to write it is logged
    /// and the receipt is still returned.
    pub async fn share_file(
        &self,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<UploadReceipt, ClientError> {
        let receipt = self.upload(filename, content).await?;
        info!(filename = %receipt.filename, "file uploaded");
        let entry = format!("File uploaded: {}", receipt.filename);
        if let Err(e) = self.append(TranscriptRole::User, &entry).await {
            warn!(
                kind = ?CallErrorKind::LoggingFailure,
                error = %e,
                "failed to record upload in the transcript"
            );
        }
        Ok(receipt)
    }
}

/// Turns an unexpected status into a [`ClientError`], reading the service's
/// `{ error, details }` body when there is one.
async fn expect_status(response: Response, expected: StatusCode) -> Result<Response, ClientError> {
    let status = response.status();
    if status == expected {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => match body.details {
            Some(details) => format!("{}: {details}", body.error),
            None => body.error,
        },
        Err(_) => text,
    };
    if status == StatusCode::SERVICE_UNAVAILABLE {
        return Err(ClientError::Unavailable { details: message });
    }
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl AvailabilityCheck for ServiceClient {
    async fn check(&self) -> AvailabilityStatus {
        let request = self
            .http
            .get(self.url("/api/check-service"))
            .timeout(self.availability_timeout);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return AvailabilityStatus::unavailable(format!(
                    "availability check timed out after {}s",
                    self.availability_timeout.as_secs()
                ))
            }
            Err(e) => return AvailabilityStatus::unavailable(format!("network error: {e}")),
        };

        let status = response.status();
        let body = match response.json::<ServiceCheckResponse>().await {
            Ok(body) => body,
            Err(e) => {
                return AvailabilityStatus::unavailable(format!(
                    "malformed availability response ({status}): {e}"
                ))
            }
        };

        if status.is_success() && body.available {
            debug!("voice service available");
            AvailabilityStatus::available()
        } else {
            let reason = body
                .details
                .or(body.error)
                .unwrap_or_else(|| format!("service answered {status}"));
            AvailabilityStatus::unavailable(reason)
        }
    }
}

#[async_trait]
impl CredentialSource for ServiceClient {
    async fn credentials(&self) -> Result<CallParams, ClientError> {
        let body = CallRequest {
            agent_id: self.agent_id.as_deref(),
        };
        let request = self.authed(self.http.post(self.url("/api/call")))?;
        let response = expect_status(request.json(&body).send().await?, StatusCode::CREATED).await?;
        let call: CallResponse = response.json().await?;
        debug!(call_id = %call.call_id, "call credentials issued");
        Ok(CallParams {
            access_token: call.access_token,
            call_id: call.call_id,
        })
    }
}

#[async_trait]
impl TranscriptLogger for ServiceClient {
    async fn append(&self, role: TranscriptRole, message: &str) -> Result<(), ClientError> {
        let request = self.authed(self.http.post(self.url("/api/conversations")))?;
        expect_status(
            request.json(&NewEntry { message, role }).send().await?,
            StatusCode::CREATED,
        )
        .await?;
        Ok(())
    }
}
