#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use parley_db::{create_pool, DbPool, DbRuntimeSettings};
use parley_server::{app, AppState};
use parley_voice::{VoiceApiConfig, VoiceService};
use serde_json::Value;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt; // for oneshot

pub struct TestApp {
    pub router: Router,
    pub pool: DbPool,
    // Keeps the database file alive for the test's duration.
    _db_file: NamedTempFile,
}

pub fn test_app(voice: VoiceApiConfig) -> TestApp {
    // A file-backed database so every pooled connection sees the same schema.
    let db_file = NamedTempFile::new().unwrap();
    let pool = create_pool(db_file.path().to_str().unwrap(), DbRuntimeSettings::default()).unwrap();
    parley_db::run_migrations(&pool.get().unwrap()).unwrap();

    let state = AppState {
        pool: pool.clone(),
        voice_service: Arc::new(VoiceService::new(voice).unwrap()),
        secure_cookies: false,
        client_dir: None,
    };

    TestApp {
        router: app(state),
        pool,
        _db_file: db_file,
    }
}

/// App with no voice API key configured.
pub fn unconfigured_app() -> TestApp {
    test_app(VoiceApiConfig::default())
}

pub fn cookie(user_id: &str) -> String {
    format!("userId={user_id}")
}

pub fn new_user() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

pub fn get(uri: &str, user_id: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(user_id) = user_id {
        builder = builder.header(header::COOKIE, cookie(user_id));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, user_id: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(user_id) = user_id {
        builder = builder.header(header::COOKIE, cookie(user_id));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}
