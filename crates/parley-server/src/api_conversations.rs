//! Transcript history handlers.

use crate::api::ApiError;
use crate::middleware::UserContext;
use crate::AppState;
use axum::{extract::Extension, http::StatusCode, Json};
use parley_transcripts::TranscriptError;
use parley_types::{TranscriptEntry, TranscriptRole};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct NewEntryRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub role: String,
}

fn map_transcript_error(e: TranscriptError) -> ApiError {
    match e {
        TranscriptError::EmptyMessage => ApiError::BadRequest("Message is required".to_string()),
        TranscriptError::Database(e) => {
            ApiError::InternalServerError(format!("transcript query failed: {e}"))
        }
    }
}

/// Handler for `GET /api/conversations`.
pub async fn list_conversations_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(UserContext(user_id)): Extension<UserContext>,
) -> Result<Json<Vec<TranscriptEntry>>, ApiError> {
    let entries = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get()?;
        parley_transcripts::list_entries(&conn, &user_id).map_err(map_transcript_error)
    })
    .await??;

    Ok(Json(entries))
}

/// Handler for `POST /api/conversations`.
pub async fn create_conversation_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(UserContext(user_id)): Extension<UserContext>,
    Json(payload): Json<NewEntryRequest>,
) -> Result<(StatusCode, Json<TranscriptEntry>), ApiError> {
    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message is required".to_string()));
    }
    let role: TranscriptRole = payload
        .role
        .parse()
        .map_err(|e: parley_types::ParseRoleError| ApiError::BadRequest(e.to_string()))?;

    let entry = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get()?;
        parley_transcripts::append_entry(&conn, &user_id, role, &payload.message)
            .map_err(map_transcript_error)
    })
    .await??;

    Ok((StatusCode::CREATED, Json(entry)))
}
