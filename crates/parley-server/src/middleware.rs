//! Cookie-based user identity.
//!
//! Every browser gets a random user id in the `userId` cookie on its first
//! `GET /api/user`. Routes behind [`auth_middleware`] read it back and
//! expose it to handlers as [`UserContext`].

use crate::api::ApiError;
use axum::{
    body::Body,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const USER_COOKIE: &str = "userId";

/// One year, in seconds.
const COOKIE_MAX_AGE_SECS: u64 = 365 * 24 * 60 * 60;

/// The caller's user id, inserted into request extensions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserContext(pub String);

/// Returns the user id from the `userId` cookie if it is a well-formed id.
pub fn user_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == USER_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
        .map(|id| id.to_string())
}

/// `Set-Cookie` value carrying a user id.
pub fn identity_cookie(user_id: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{USER_COOKIE}={user_id}; Max-Age={COOKIE_MAX_AGE_SECS}; Path=/; HttpOnly; SameSite=Lax"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Rejects requests without a valid identity cookie.
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let user_id = user_id_from_headers(req.headers())
        .ok_or_else(|| ApiError::Unauthorized("User not authenticated".to_string()))?;
    req.extensions_mut().insert(UserContext(user_id));
    Ok(next.run(req).await)
}
