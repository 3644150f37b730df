// handlers/protected/quiz.rs - test configuration and question handlers
//
// /api/tests/:test, /api/tests/:test/questions, /api/questions/:question,
// /api/swap/questions

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::auth::Principal;
use crate::database::models::TestBlock;
use crate::handlers::SwapRequest;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::quiz::{NewQuestion, QuestionView, TestConfigPatch};
use crate::services::AppState;

/// GET /api/tests/:test - time limit and retry count
pub async fn test_get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(test_block_id): Path<Uuid>,
) -> ApiResult<TestBlock> {
    Ok(ApiResponse::success(state.quiz().get_test_config(&principal, test_block_id).await?))
}

/// PATCH /api/tests/:test
pub async fn test_patch(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(test_block_id): Path<Uuid>,
    Json(body): Json<TestConfigPatch>,
) -> ApiResult<TestBlock> {
    Ok(ApiResponse::success(
        state.quiz().update_test_config(&principal, test_block_id, body).await?,
    ))
}

/// GET /api/tests/:test/questions - `is_correct` is only shown to authors
pub async fn questions_get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(test_block_id): Path<Uuid>,
) -> ApiResult<Vec<QuestionView>> {
    Ok(ApiResponse::success(state.quiz().list_questions(&principal, test_block_id).await?))
}

/// POST /api/tests/:test/questions
pub async fn question_post(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(test_block_id): Path<Uuid>,
    Json(body): Json<NewQuestion>,
) -> ApiResult<QuestionView> {
    let question = state.quiz().create_question(&principal, test_block_id, body).await?;
    Ok(ApiResponse::created(question))
}

/// PUT /api/questions/:question - replaces text, type, points and all answers
pub async fn question_put(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(question_id): Path<Uuid>,
    Json(body): Json<NewQuestion>,
) -> ApiResult<QuestionView> {
    Ok(ApiResponse::success(
        state.quiz().replace_question(&principal, question_id, body).await?,
    ))
}

/// DELETE /api/questions/:question
pub async fn question_delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(question_id): Path<Uuid>,
) -> ApiResult<()> {
    state.quiz().delete_question(&principal, question_id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /api/swap/questions
pub async fn questions_swap(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<SwapRequest>,
) -> ApiResult<()> {
    state.quiz().swap_questions(&principal, body.first, body.second).await?;
    Ok(ApiResponse::no_content())
}
