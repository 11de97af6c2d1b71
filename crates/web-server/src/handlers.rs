use crate::dto::{
    CreatePullRequestRequest, MergeRequest, PullRequestResponse, ReassignRequest,
    ReassignResponse, ReviewQueueResponse, SetIsActiveRequest, TeamDto, TeamQuery, TeamResponse,
    UserQuery, UserResponse,
};
use crate::{error::AppError, AppState};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    Json,
};
use engine::EngineError;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;

type Payload<T> = Result<Json<T>, JsonRejection>;
type Params<T> = Result<Query<T>, QueryRejection>;

/// Runs one engine call under the request deadline. On expiry the call is
/// dropped, which drops its open unit of work without committing it.
async fn with_deadline<T>(
    state: &AppState,
    call: impl Future<Output = Result<T, EngineError>>,
) -> Result<T, AppError> {
    match tokio::time::timeout(state.request_timeout, call).await {
        Ok(result) => result.map_err(AppError::from),
        Err(_) => Err(AppError::Timeout),
    }
}

fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// # GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// # POST /team/add
pub async fn add_team(
    State(state): State<Arc<AppState>>,
    payload: Payload<TeamDto>,
) -> Result<(StatusCode, Json<TeamResponse>), AppError> {
    let Json(req) = payload?;
    require("team_name", &req.team_name)?;
    for member in &req.members {
        require("user_id", &member.user_id)?;
        require("username", &member.username)?;
    }

    let team = with_deadline(&state, state.services.teams.add_team(req.into())).await?;
    Ok((StatusCode::CREATED, Json(TeamResponse { team: team.into() })))
}

/// # GET /team/get?team_name=
pub async fn get_team(
    State(state): State<Arc<AppState>>,
    params: Params<TeamQuery>,
) -> Result<Json<TeamDto>, AppError> {
    let Query(query) = params?;
    require("team_name", &query.team_name)?;

    let team = with_deadline(&state, state.services.teams.get_team(&query.team_name)).await?;
    Ok(Json(team.into()))
}

/// # POST /users/setIsActive
pub async fn set_is_active(
    State(state): State<Arc<AppState>>,
    payload: Payload<SetIsActiveRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let Json(req) = payload?;
    require("user_id", &req.user_id)?;

    let user = with_deadline(
        &state,
        state.services.users.set_active(&req.user_id, req.is_active),
    )
    .await?;
    Ok(Json(UserResponse { user: user.into() }))
}

/// # GET /users/getReview?user_id=
pub async fn get_review(
    State(state): State<Arc<AppState>>,
    params: Params<UserQuery>,
) -> Result<Json<ReviewQueueResponse>, AppError> {
    let Query(query) = params?;
    require("user_id", &query.user_id)?;

    let queue = with_deadline(&state, state.services.users.review_queue(&query.user_id)).await?;
    Ok(Json(ReviewQueueResponse {
        user_id: query.user_id,
        pull_requests: queue.into_iter().map(Into::into).collect(),
    }))
}

/// # POST /pullRequest/create
pub async fn create_pull_request(
    State(state): State<Arc<AppState>>,
    payload: Payload<CreatePullRequestRequest>,
) -> Result<(StatusCode, Json<PullRequestResponse>), AppError> {
    let Json(req) = payload?;
    require("pull_request_id", &req.pull_request_id)?;
    require("pull_request_name", &req.pull_request_name)?;
    require("author_id", &req.author_id)?;

    let pr = with_deadline(
        &state,
        state.services.pull_requests.create_with_reviewers(req.into()),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(PullRequestResponse { pr: pr.into() })))
}

/// # POST /pullRequest/merge
pub async fn merge_pull_request(
    State(state): State<Arc<AppState>>,
    payload: Payload<MergeRequest>,
) -> Result<Json<PullRequestResponse>, AppError> {
    let Json(req) = payload?;
    require("pull_request_id", &req.pull_request_id)?;

    let pr = with_deadline(&state, state.services.pull_requests.merge(&req.pull_request_id)).await?;
    Ok(Json(PullRequestResponse { pr: pr.into() }))
}

/// # POST /pullRequest/reassign
pub async fn reassign_reviewer(
    State(state): State<Arc<AppState>>,
    payload: Payload<ReassignRequest>,
) -> Result<Json<ReassignResponse>, AppError> {
    let Json(req) = payload?;
    require("pull_request_id", &req.pull_request_id)?;
    require("old_user_id", &req.old_user_id)?;

    let outcome = with_deadline(
        &state,
        state
            .services
            .pull_requests
            .reassign(&req.pull_request_id, &req.old_user_id),
    )
    .await?;
    Ok(Json(outcome.into()))
}
