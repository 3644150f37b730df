// handlers/protected/membership.rs - joining, leaving and moderating course members

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Principal;
use crate::database::models::CourseJoinRequest;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::membership::{DecisionAccepted, JoinOutcome, MemberInfo};
use crate::services::AppState;
use crate::types::{CourseRole, JoinStatus};

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub course_id: Uuid,
    pub outcome: JoinOutcome,
}

/// POST /api/courses/:course/join - joins public courses at once, files a
/// request for moderated ones
pub async fn join_post(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<JoinResponse> {
    let outcome = state.membership().request_to_join(&principal, course_id).await?;
    let response = JoinResponse { course_id, outcome };
    Ok(match outcome {
        JoinOutcome::Joined => ApiResponse::success(response),
        JoinOutcome::Pending => ApiResponse::accepted(response),
    })
}

#[derive(Debug, Deserialize)]
pub struct JoinCodeRequest {
    pub code: String,
}

/// POST /api/join - enter a course with its join code
pub async fn join_code_post(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<JoinCodeRequest>,
) -> ApiResult<JoinResponse> {
    let course_id = state.membership().join_by_code(&principal, body.code.trim()).await?;
    Ok(ApiResponse::success(JoinResponse {
        course_id,
        outcome: JoinOutcome::Joined,
    }))
}

/// POST /api/courses/:course/leave
pub async fn leave_post(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<()> {
    state.membership().leave(&principal, course_id).await?;
    Ok(ApiResponse::no_content())
}

/// GET /api/courses/:course/members
pub async fn members_get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<Vec<MemberInfo>> {
    Ok(ApiResponse::success(state.membership().list_members(&principal, course_id).await?))
}

/// DELETE /api/courses/:course/members/:user - kick
pub async fn member_delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((course_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<()> {
    state.membership().kick(&principal, course_id, user_id).await?;
    Ok(ApiResponse::no_content())
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: CourseRole,
}

/// PUT /api/courses/:course/members/:user/role - student <-> co_lecturer
pub async fn member_role_put(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((course_id, user_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<RoleRequest>,
) -> ApiResult<()> {
    state.membership().promote(&principal, course_id, user_id, body.role).await?;
    Ok(ApiResponse::no_content())
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestFilter {
    pub status: Option<JoinStatus>,
}

/// GET /api/courses/:course/requests[?status=on_mod]
pub async fn requests_get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(course_id): Path<Uuid>,
    Query(filter): Query<RequestFilter>,
) -> ApiResult<Vec<CourseJoinRequest>> {
    Ok(ApiResponse::success(
        state
            .membership()
            .list_join_requests(&principal, course_id, filter.status)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub status: JoinStatus,
}

/// POST /api/courses/:course/requests/:request - approve or reject.
/// Answers 202; the decision is applied by a background job.
pub async fn request_decision_post(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((course_id, request_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<DecisionRequest>,
) -> ApiResult<DecisionAccepted> {
    let accepted = state
        .membership()
        .approve_or_reject(&principal, course_id, request_id, body.status)
        .await?;
    Ok(ApiResponse::accepted(accepted))
}
