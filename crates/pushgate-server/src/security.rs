//! Decision API authentication
//!
//! When `server.api_key` is set every `/api/v1` request must carry
//! `Authorization: Bearer <api_key>`. The proxy route is never guarded here;
//! git credentials travel through to the upstream untouched.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use http::header::AUTHORIZATION;
use http::HeaderMap;
use std::sync::Arc;
use tracing::warn;

/// Token of a `Bearer` authorization header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|token| !token.is_empty())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Reject API calls without the configured bearer token
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = &state.api_key else {
        return Ok(next.run(request).await);
    };

    match bearer_token(request.headers()) {
        Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => {
            Ok(next.run(request).await)
        }
        _ => {
            warn!(path = %request.uri().path(), "Rejected decision API call without valid API key");
            Err(ApiError::Unauthorized)
        }
    }
}
