//! The git smart-HTTP proxy route
//!
//! Every request that is not part of the decision API lands here. It is
//! validated, buffered, run through the chain and then either answered with
//! a sideband error or forwarded to `{action.url}{git_path}`.

use crate::forward::forward;
use crate::state::AppState;
use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use http::header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA, VARY, X_FRAME_OPTIONS};
use http::HeaderValue;
use pushgate_core::urls::{process_url_path, valid_git_request};
use pushgate_core::{Action, GitRequest};
use pushgate_protocol::error_packet;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Body of the answer to a request that is not from a git client
pub const INVALID_REQUEST: &str = "Invalid request received";

const RECEIVE_PACK_RESULT: &str = "application/x-git-receive-pack-result";

/// The `200` sideband answer git prints as `remote: <message>`
pub fn rejection_response(message: &str) -> Response {
    let mut response = Response::new(Body::from(error_packet(message)));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(RECEIVE_PACK_RESULT));
    headers.insert(
        EXPIRES,
        HeaderValue::from_static("Fri, 01 Jan 1980 00:00:00 GMT"),
    );
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-cache, max-age=0, must-revalidate"),
    );
    headers.insert(VARY, HeaderValue::from_static("Accept-Encoding"));
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    response
}

/// Message shown to the client for a stopped action
fn rejection_message(action: &Action) -> &str {
    action
        .blocked_message
        .as_deref()
        .filter(|_| action.blocked)
        .or(action.error_message.as_deref())
        .unwrap_or("Your push has been blocked.")
}

/// Fallback handler
pub async fn proxy_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let Some(url_path) = process_url_path(&path) else {
        return (StatusCode::BAD_REQUEST, INVALID_REQUEST).into_response();
    };
    if !valid_git_request(&url_path.git_path, request.headers()) {
        info!(%path, "Rejected request not coming from a git client");
        return (StatusCode::BAD_REQUEST, INVALID_REQUEST).into_response();
    }

    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, state.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            warn!(%path, error = %e, "Failed to buffer request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let req = GitRequest::new(
        parts.method.clone(),
        path.as_str(),
        parts.headers.clone(),
        body.clone(),
    );
    let execution = state.chain.execute(&req).await;
    let action = execution.action;

    if action.error || action.blocked {
        return rejection_response(rejection_message(&action));
    }

    let target = format!("{}{}", action.url, url_path.git_path);
    match forward(&state.client, &target, parts.method, &parts.headers, body).await {
        Ok(response) => response,
        Err(e) => {
            error!(action_id = %action.id, url = %target, error = %e, "Upstream request failed");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
