use axum::extract::{Path, Query, State};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::votes::VoteOutcome;

#[derive(Deserialize)]
pub struct VoteParams {
    #[serde(rename = "postID")]
    pub post_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatus {
    #[serde(rename = "postID")]
    pub post_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    pub voted: bool,
    pub like_count: i64,
    /// Only set by POST, to tell a new vote from a repeated one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<VoteOutcome>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/vote", get(check_vote).post(add_vote))
        .route("/api/vote/{postid}/{userid}", delete(remove_vote))
}

fn require_ids(params: &VoteParams) -> AppResult<()> {
    if params.post_id.trim().is_empty() || params.user_id.trim().is_empty() {
        return Err(AppError::BadRequest("postID and userID are required".into()));
    }
    Ok(())
}

async fn status(
    state: &AppState,
    params: VoteParams,
    voted: bool,
    outcome: Option<VoteOutcome>,
) -> AppResult<Json<VoteStatus>> {
    let like_count = state.votes.count_votes(&params.post_id).await?;
    Ok(Json(VoteStatus {
        post_id: params.post_id,
        user_id: params.user_id,
        voted,
        like_count,
        outcome,
    }))
}

/// GET /api/vote?postID=..&userID=..
async fn check_vote(
    State(state): State<AppState>,
    Query(params): Query<VoteParams>,
) -> AppResult<Json<VoteStatus>> {
    require_ids(&params)?;
    let voted = state.votes.has_voted(&params.user_id, &params.post_id).await?;
    status(&state, params, voted, None).await
}

async fn add_vote(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(params): Json<VoteParams>,
) -> AppResult<Json<VoteStatus>> {
    require_ids(&params)?;
    let outcome = state.votes.add_vote(&params.user_id, &params.post_id).await?;
    tracing::debug!(post_id = %params.post_id, user_id = %params.user_id, ?outcome, "Vote recorded");
    status(&state, params, true, Some(outcome)).await
}

async fn remove_vote(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path((post_id, user_id)): Path<(String, String)>,
) -> AppResult<Json<VoteStatus>> {
    let params = VoteParams { post_id, user_id };
    let removed = state.votes.remove_vote(&params.user_id, &params.post_id).await?;
    tracing::debug!(post_id = %params.post_id, user_id = %params.user_id, removed, "Vote removed");
    status(&state, params, false, None).await
}
