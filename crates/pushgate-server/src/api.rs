//! Decision API under `/api/v1`

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use pushgate_core::{Action, Attestation, DecisionReceipt, PushFilter, Reviewer};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Body of an authorise or reject call
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    /// Who decides
    pub reviewer: Reviewer,
    /// Review checklist answers
    #[serde(default)]
    pub questions: Vec<Value>,
}

impl ReviewRequest {
    fn attestation(self) -> Attestation {
        let mut attestation = Attestation::by(self.reviewer.username, self.reviewer.git_account);
        attestation.questions = self.questions;
        attestation
    }
}

/// `GET /push`: pushes matching the query, pending reviews when no field is given
pub async fn list_pushes(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<PushFilter>,
) -> Result<Json<Vec<Action>>, ApiError> {
    let filter = if filter == PushFilter::default() {
        PushFilter::pending()
    } else {
        filter
    };
    let pushes = state.store().list_pushes(&filter).await?;
    Ok(Json(pushes))
}

/// `GET /push/:id`
pub async fn get_push(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Action>, ApiError> {
    stored_push(&state, &id).await.map(Json)
}

/// Body of a cancel call
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    /// Who cancels
    pub reviewer: Reviewer,
}

async fn stored_push(state: &AppState, id: &str) -> Result<Action, ApiError> {
    state
        .store()
        .get_push(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("push {id}")))
}

/// Whether `reviewer` authored `action`; admin authors only count when
/// `count_admins` is set
async fn is_own_push(
    state: &AppState,
    action: &Action,
    reviewer: &Reviewer,
    count_admins: bool,
) -> Result<bool, ApiError> {
    if !reviewer.git_account.is_empty()
        && action
            .user
            .as_deref()
            .is_some_and(|user| user.eq_ignore_ascii_case(&reviewer.git_account))
    {
        return Ok(true);
    }
    let Some(email) = action.user_email.as_deref() else {
        return Ok(false);
    };
    let authors = state.store().get_users_by_email(email).await?;
    Ok(authors
        .iter()
        .any(|user| {
        (count_admins || !user.admin) && user.username.eq_ignore_ascii_case(&reviewer.username)
    }))
}

/// Fails unless `reviewer` is in the repository's authorise list and did
/// not author the push
async fn ensure_can_review(
    state: &AppState,
    id: &str,
    reviewer: &Reviewer,
    verb: &str,
) -> Result<(), ApiError> {
    let action = stored_push(state, id).await?;
    let repo = state.store().get_repo_by_url(&action.url).await?;
    let allowed = repo.is_some_and(|repo| {
        repo.users
            .can_authorise
            .iter()
            .any(|user| user.eq_ignore_ascii_case(&reviewer.username))
    });
    if !allowed {
        return Err(ApiError::Forbidden(format!(
            "{} is not allowed to review pushes to {}",
            reviewer.username, action.url
        )));
    }
    if is_own_push(state, &action, reviewer, false).await? {
        return Err(ApiError::Forbidden(format!("Cannot {verb} your own changes")));
    }
    Ok(())
}

/// `POST /push/:id/authorise`
pub async fn authorise(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(review): Json<ReviewRequest>,
) -> Result<Json<DecisionReceipt>, ApiError> {
    ensure_can_review(&state, &id, &review.reviewer, "approve").await?;
    info!(action_id = %id, reviewer = %review.reviewer.username, "Authorising push");
    let receipt = state.store().authorise(&id, review.attestation()).await?;
    Ok(Json(receipt))
}

/// `POST /push/:id/reject`
pub async fn reject(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(review): Json<ReviewRequest>,
) -> Result<Json<DecisionReceipt>, ApiError> {
    ensure_can_review(&state, &id, &review.reviewer, "reject").await?;
    info!(action_id = %id, reviewer = %review.reviewer.username, "Rejecting push");
    let receipt = state.store().reject(&id, review.attestation()).await?;
    Ok(Json(receipt))
}

/// `POST /push/:id/cancel`: allowed for the pusher and the repository's pushers
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<DecisionReceipt>, ApiError> {
    let action = stored_push(&state, &id).await?;
    let username = &request.reviewer.username;
    let allowed = is_own_push(&state, &action, &request.reviewer, true).await?
        || state.store().can_user_push(&action.url, username).await?;
    if !allowed {
        return Err(ApiError::Forbidden(format!(
            "User {username} not authorised to cancel push requests on this project."
        )));
    }

    info!(action_id = %id, user = %username, "Canceling push");
    let receipt = state.store().cancel(&id).await?;
    Ok(Json(receipt))
}
