//! services/api/src/web/middleware.rs
//!
//! Caller identification for protected routes.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::warn;
use uuid::Uuid;

/// The header the upstream auth provider sets after authenticating the caller.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Middleware that extracts the authenticated user id.
///
/// If valid, inserts the user_id into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_user(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let raw = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let user_id = Uuid::parse_str(raw.trim()).map_err(|_| {
        warn!("Rejected malformed {} header", USER_ID_HEADER);
        StatusCode::UNAUTHORIZED
    })?;

    req.extensions_mut().insert(user_id);
    Ok(next.run(req).await)
}
