//! Parley HTTP service.
//!
//! Issues anonymous cookie identities, reports whether the voice provider
//! is usable, mints web-call credentials, and stores per-user transcripts
//! and uploaded context files.

pub mod api;
pub mod api_conversations;
pub mod api_upload;
pub mod config;
pub mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::{get, post},
    Extension, Router,
};
use parley_db::DbPool;
use parley_voice::VoiceService;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Body limit for JSON endpoints.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Multipart framing allowance on top of [`api_upload::MAX_UPLOAD_SIZE`].
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Voice provider client.
    pub voice_service: Arc<VoiceService>,
    /// Whether the identity cookie is marked `Secure`.
    pub secure_cookies: bool,
    /// Static client directory, served when it contains `index.html`.
    pub client_dir: Option<String>,
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/call", post(api::create_call_handler))
        .route(
            "/api/conversations",
            get(api_conversations::list_conversations_handler)
                .post(api_conversations::create_conversation_handler),
        )
        .route("/api/uploads", get(api_upload::list_uploads_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(axum::middleware::from_fn(middleware::auth_middleware));

    let upload_routes = Router::new()
        .route("/api/upload", post(api_upload::upload_handler))
        .layer(DefaultBodyLimit::max(
            api_upload::MAX_UPLOAD_SIZE + UPLOAD_OVERHEAD_BYTES,
        ))
        .layer(axum::middleware::from_fn(middleware::auth_middleware));

    let router = Router::new()
        .route("/health", get(api::health))
        .route("/api/user", get(api::user_handler))
        .route("/api/check-service", get(api::check_service_handler))
        .merge(protected_routes)
        .merge(upload_routes);

    let router = match state.client_dir.as_deref() {
        Some(dir) if Path::new(dir).join("index.html").exists() => {
            tracing::info!(path = %dir, "serving client static files");
            let index = Path::new(dir).join("index.html");
            router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)))
        }
        Some(dir) => {
            tracing::info!(path = %dir, "client directory not found, skipping static file serving");
            router
        }
        None => router,
    };

    // Credentialed CORS cannot use wildcards, so origins are mirrored and
    // methods/headers listed.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(Extension(Arc::new(state)))
}
