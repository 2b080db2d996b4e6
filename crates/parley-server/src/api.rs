//! Identity, availability, and call-setup handlers, plus the shared error type.

use crate::middleware::{identity_cookie, user_id_from_headers, UserContext};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::Extension,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use parley_voice::VoiceError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// API error type mapping to HTTP status codes.
///
/// Every variant renders as `{ "error": ..., "details"?: ... }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("{error}: {details}")]
    ServiceUnavailable { error: String, details: String },
    /// A failure with a public summary and a diagnostic detail.
    #[error("{error}: {details}")]
    Upstream { error: String, details: String },
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            ApiError::ServiceUnavailable { error, details } => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": error, "details": details }),
            ),
            ApiError::Upstream { error, details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": error, "details": details }),
            ),
            ApiError::InternalServerError(msg) => {
                tracing::error!(error = %msg, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<r2d2::Error> for ApiError {
    fn from(e: r2d2::Error) -> Self {
        ApiError::InternalServerError(format!("db connection failed: {e}"))
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::InternalServerError(format!("task join error: {e}"))
    }
}

/// Handler for `GET /health`.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub user_id: String,
}

/// Handler for `GET /api/user`.
///
/// Returns the caller's id, minting one (and setting the cookie) when the
/// request carries no valid identity.
pub async fn user_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if let Some(user_id) = user_id_from_headers(&headers) {
        return Json(UserResponse { user_id }).into_response();
    }

    let user_id = Uuid::new_v4().to_string();
    tracing::info!(%user_id, "issued new user identity");
    let cookie = identity_cookie(&user_id, state.secure_cookies);
    (
        [(header::SET_COOKIE, cookie)],
        Json(UserResponse { user_id }),
    )
        .into_response()
}

/// Handler for `GET /api/check-service`.
pub async fn check_service_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    if state.voice_service.is_configured() {
        return Json(json!({ "available": true })).into_response();
    }
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "available": false,
            "error": "Voice service unavailable",
            "details": "Voice API key is not configured",
        })),
    )
        .into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(default)]
    pub agent_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResponse {
    pub access_token: String,
    pub call_id: String,
}

/// Handler for `POST /api/call`.
///
/// The body is optional; without an `agentId` the configured default agent
/// is used.
pub async fn create_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(UserContext(user_id)): Extension<UserContext>,
    body: Bytes,
) -> Result<(StatusCode, Json<CallResponse>), ApiError> {
    let request: CallRequest = if body.is_empty() {
        CallRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?
    };

    if !state.voice_service.is_configured() {
        return Err(ApiError::ServiceUnavailable {
            error: "Voice service unavailable".to_string(),
            details: "Voice API key is not configured".to_string(),
        });
    }

    let agent_id = request
        .agent_id
        .filter(|id| !id.trim().is_empty())
        .or_else(|| state.voice_service.default_agent_id().map(str::to_string))
        .ok_or_else(|| ApiError::BadRequest("Agent ID is required".to_string()))?;

    let call = state
        .voice_service
        .create_web_call(&agent_id, &user_id)
        .await
        .map_err(|e| match e {
            VoiceError::Unavailable(details) => {
                tracing::warn!(%user_id, %details, "voice service unavailable");
                ApiError::ServiceUnavailable {
                    error: "Voice service unavailable".to_string(),
                    details,
                }
            }
            other => {
                tracing::error!(%user_id, error = %other, "failed to create web call");
                ApiError::Upstream {
                    error: "Failed to create web call".to_string(),
                    details: other.to_string(),
                }
            }
        })?;

    tracing::info!(%user_id, call_id = %call.call_id, "web call created");
    Ok((
        StatusCode::CREATED,
        Json(CallResponse {
            access_token: call.access_token,
            call_id: call.call_id,
        }),
    ))
}
