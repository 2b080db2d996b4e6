//! Context file uploads.
//!
//! Uploaded files are decoded as text (invalid UTF-8 is replaced), wrapped
//! in a markdown document, and stored per user. The original bytes are not
//! kept.

use crate::api::ApiError;
use crate::middleware::UserContext;
use crate::AppState;
use axum::{
    extract::{Extension, Multipart},
    http::StatusCode,
    Json,
};
use parley_types::UploadSummary;
use serde::Serialize;
use std::sync::Arc;

/// Largest accepted file, in bytes.
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Multipart field carrying the file.
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
}

/// Handler for `POST /api/upload`.
pub async fn upload_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(UserContext(user_id)): Extension<UserContext>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let field = loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("multipart error: {e}")))?
            .ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))?;
        if field.name() == Some(FILE_FIELD) {
            break field;
        }
    };

    let filename = parley_transcripts::sanitize_filename(field.file_name().unwrap_or_default());

    let data = field
        .bytes()
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;

    if data.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }
    if data.len() > MAX_UPLOAD_SIZE {
        return Err(ApiError::BadRequest(format!(
            "file too large: {} bytes (max {MAX_UPLOAD_SIZE})",
            data.len()
        )));
    }

    let content = String::from_utf8_lossy(&data);
    let markdown = parley_transcripts::to_markdown(&filename, &content);

    let stored = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get()?;
        parley_transcripts::save_upload(&conn, &user_id, &filename, &markdown)
            .map_err(|e| ApiError::InternalServerError(format!("failed to store upload: {e}")))
    })
    .await??;

    tracing::info!(
        user_id = %stored.user_id,
        filename = %stored.filename,
        bytes = data.len(),
        "context file uploaded"
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: "File uploaded successfully".to_string(),
            filename: stored.filename,
        }),
    ))
}

/// Handler for `GET /api/uploads`.
pub async fn list_uploads_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(UserContext(user_id)): Extension<UserContext>,
) -> Result<Json<Vec<UploadSummary>>, ApiError> {
    let uploads = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get()?;
        parley_transcripts::list_uploads(&conn, &user_id)
            .map_err(|e| ApiError::InternalServerError(format!("upload query failed: {e}")))
    })
    .await??;

    Ok(Json(uploads))
}
