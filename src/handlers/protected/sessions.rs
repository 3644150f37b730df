// handlers/protected/sessions.rs - timed test attempts

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Principal;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::sessions::{AnswerSubmission, SessionOutcome, SessionStart, SessionView};
use crate::services::AppState;

/// POST /api/tests/:test/sessions - start an attempt, or resume the running one
pub async fn session_post(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(test_block_id): Path<Uuid>,
) -> ApiResult<SessionStart> {
    let start = state.sessions().create_session(&principal, test_block_id).await?;
    Ok(match start.outcome {
        SessionOutcome::Started => ApiResponse::created(start),
        SessionOutcome::Resumed => ApiResponse::success(start),
    })
}

/// GET /api/sessions/:token - time left, answered questions, score once finished
pub async fn session_get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(token): Path<Uuid>,
) -> ApiResult<SessionView> {
    Ok(ApiResponse::success(state.sessions().session_view(&principal, token).await?))
}

#[derive(Debug, Deserialize)]
pub struct AnswersRequest {
    pub answers: Vec<AnswerSubmission>,
}

/// POST /api/sessions/:token/answers - replace selections for the given questions
pub async fn answers_post(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(token): Path<Uuid>,
    Json(body): Json<AnswersRequest>,
) -> ApiResult<SessionView> {
    Ok(ApiResponse::success(
        state.sessions().submit_answers(&principal, token, body.answers).await?,
    ))
}

/// POST /api/sessions/:token/finish - score and close the attempt
pub async fn finish_post(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(token): Path<Uuid>,
) -> ApiResult<SessionView> {
    Ok(ApiResponse::success(state.sessions().finish_session(&principal, token).await?))
}
