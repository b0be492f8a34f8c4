//! Auth Gate: every private route runs behind [`require_auth`].
//!
//! The token travels in `x-auth-token` as a raw JWT. `Authorization:
//! Bearer <jwt>` is accepted as well. A verified request gets an
//! [`AuthContext`] in its extensions; anything else is answered with 401
//! before the handler runs.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::JwtKeys;
use crate::error::AppError;

pub const TOKEN_HEADER: &str = "x-auth-token";
pub const NO_TOKEN: &str = "No token, authorization denied";
pub const BAD_TOKEN: &str = "Token is not valid";

/// Identity of the caller, valid for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
}

fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    if let Some(raw) = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        let raw = raw.trim();
        if !raw.is_empty() {
            return Some(raw);
        }
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn require_auth(
    State(keys): State<JwtKeys>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = token_from_headers(request.headers()) else {
        warn!(uri = %request.uri(), "request without token");
        return Err(AppError::Unauthorized(NO_TOKEN.into()));
    };

    let user_id = keys.verify(token).map_err(|_| {
        warn!(uri = %request.uri(), "invalid or expired token");
        AppError::Unauthorized(BAD_TOKEN.into())
    })?;

    request.extensions_mut().insert(AuthContext { user_id });
    Ok(next.run(request).await)
}
